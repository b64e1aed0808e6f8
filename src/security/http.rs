//! HTTP classifier client.
//!
//! Talks to a prediction service exposing:
//!
//! ```json
//! POST /predict
//! { "domain": "example.com" }
//!
//! Response:
//! {
//!   "domain": "example.com",
//!   "prediction": 0,
//!   "label": "safe",
//!   "confidence": 0.97,
//!   "timestamp": 1700000000.0
//! }
//! ```
//!
//! Extra response fields are ignored. A body carrying `error` instead of
//! a verdict is reported as a service error. Availability is checked with
//! `GET /` on the service root.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassifierError, DomainClassifier, SecurityVerdict};

/// HTTP-based domain classifier
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    base_url: String,
    client: Client,
}

impl HttpClassifier {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:5000`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    domain: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    prediction: Option<u8>,
    label: Option<String>,
    confidence: Option<f64>,
    error: Option<String>,
}

impl PredictResponse {
    fn into_verdict(self) -> Result<SecurityVerdict, ClassifierError> {
        if let Some(error) = self.error {
            return Err(ClassifierError::Service(error));
        }
        let prediction = self
            .prediction
            .ok_or_else(|| ClassifierError::Protocol("response has no prediction".into()))?;
        let fallback = SecurityVerdict::fallback();
        Ok(SecurityVerdict {
            prediction,
            label: self.label.unwrap_or(fallback.label),
            confidence: self.confidence.unwrap_or(fallback.confidence),
        })
    }
}

#[async_trait]
impl DomainClassifier for HttpClassifier {
    async fn classify(&self, domain: &str) -> Result<SecurityVerdict, ClassifierError> {
        let url = self.endpoint("/predict");
        debug!(%url, domain, "classifying domain");

        let resp = self
            .client
            .post(&url)
            .json(&PredictRequest { domain })
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifierError::Service(format!(
                "classifier returned HTTP status {status}"
            )));
        }

        resp.json::<PredictResponse>()
            .await
            .map_err(|e| ClassifierError::Protocol(format!("failed to parse JSON response: {e}")))?
            .into_verdict()
    }

    async fn is_available(&self) -> bool {
        let url = self.endpoint("/");
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(%url, error = %e, "classifier health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_avoids_double_slash() {
        let classifier =
            HttpClassifier::new("http://127.0.0.1:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(classifier.endpoint("/predict"), "http://127.0.0.1:5000/predict");
        assert_eq!(classifier.endpoint("/"), "http://127.0.0.1:5000/");
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // Bind then drop to get a port nothing listens on
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let classifier =
            HttpClassifier::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        assert!(!classifier.is_available().await);
    }

    #[test]
    fn response_can_be_deserialized() {
        let json = r#"
        {
          "domain": "paypa1-login.example",
          "prediction": 1,
          "label": "malicious",
          "confidence": 0.91,
          "timestamp": 1700000000.5
        }
        "#;

        let verdict = serde_json::from_str::<PredictResponse>(json)
            .unwrap()
            .into_verdict()
            .unwrap();
        assert!(verdict.is_malicious());
        assert_eq!(verdict.label, "malicious");
        assert_eq!(verdict.confidence, 0.91);
    }

    #[test]
    fn error_body_is_a_service_error() {
        let resp: PredictResponse = serde_json::from_str(r#"{"error": "model not loaded"}"#).unwrap();
        assert!(matches!(resp.into_verdict(), Err(ClassifierError::Service(_))));
    }
}
