//! Domain security classification
//!
//! Hostnames admitted to the ledger can be scored by an external
//! classifier. Verdicts are advisory: they are recorded on chain next to
//! the record but never block admission or change lookup results.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpClassifier;

/// Label recorded when no verdict could be obtained
pub const UNKNOWN_LABEL: &str = "unknown";

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier transport error: {0}")]
    Transport(String),
    #[error("Classifier service error: {0}")]
    Service(String),
    #[error("Classifier protocol error: {0}")]
    Protocol(String),
}

/// Outcome of classifying one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    /// 1 = malicious, 0 = safe
    pub prediction: u8,
    pub label: String,
    pub confidence: f64,
}

impl SecurityVerdict {
    /// Verdict used when the classifier is absent or failed
    pub fn fallback() -> Self {
        Self {
            prediction: 0,
            label: UNKNOWN_LABEL.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_malicious(&self) -> bool {
        self.prediction == 1
    }
}

/// Scores a domain name
#[async_trait]
pub trait DomainClassifier: Send + Sync {
    async fn classify(&self, domain: &str) -> Result<SecurityVerdict, ClassifierError>;

    /// Whether the classifier can currently answer
    async fn is_available(&self) -> bool {
        true
    }
}
