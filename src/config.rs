//! Node configuration.
//!
//! Defaults suit a single local node. Every field can be overridden from
//! the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CHAINDNS_LISTEN` | `listen_addr` |
//! | `CHAINDNS_DIFFICULTY` | `difficulty` |
//! | `CHAINDNS_PEER_TIMEOUT_SECS` | `peer_timeout` |
//! | `CHAINDNS_PEERS` | `peers` (comma separated) |
//! | `CHAINDNS_CLASSIFIER_URL` | `classifier.base_url` |
//! | `CHAINDNS_CLASSIFIER_TIMEOUT_SECS` | `classifier.timeout` |
//! | `CHAINDNS_CLASSIFIER` | `classifier.enabled` (`off` disables) |
//! | `CHAINDNS_DATA_DIR` | `data_dir` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::consensus::{Difficulty, MAX_DIFFICULTY};

/// Malformed environment overrides
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the external domain classifier
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub enabled: bool,
    /// Service root, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Top-level configuration for a node
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Address the HTTP server binds to
    pub listen_addr: SocketAddr,
    pub difficulty: Difficulty,
    /// Bound on each peer chain fetch during consensus
    pub peer_timeout: Duration,
    /// Peers registered at startup
    pub peers: Vec<String>,
    pub classifier: ClassifierConfig,
    /// Chain snapshot directory; memory only when unset
    pub data_dir: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5001)),
            difficulty: Difficulty::default(),
            peer_timeout: Duration::from_secs(5),
            peers: Vec::new(),
            classifier: ClassifierConfig::default(),
            data_dir: None,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `CHAINDNS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (var, value))
        };

        if let Some((var, value)) = get("CHAINDNS_LISTEN") {
            config.listen_addr = value
                .parse()
                .map_err(|e: std::net::AddrParseError| invalid(var, &value, e.to_string()))?;
        }

        if let Some((var, value)) = get("CHAINDNS_DIFFICULTY") {
            config.difficulty = value
                .parse::<u32>()
                .ok()
                .filter(|digits| *digits >= 1)
                .and_then(Difficulty::new)
                .ok_or_else(|| invalid(var, &value, format!("expected 1..={MAX_DIFFICULTY}")))?;
        }

        if let Some((var, value)) = get("CHAINDNS_PEER_TIMEOUT_SECS") {
            config.peer_timeout = parse_secs(var, &value)?;
        }

        if let Some((_, value)) = get("CHAINDNS_PEERS") {
            config.peers = value
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some((_, value)) = get("CHAINDNS_CLASSIFIER_URL") {
            config.classifier.base_url = value;
        }

        if let Some((var, value)) = get("CHAINDNS_CLASSIFIER_TIMEOUT_SECS") {
            config.classifier.timeout = parse_secs(var, &value)?;
        }

        if let Some((_, value)) = get("CHAINDNS_CLASSIFIER") {
            config.classifier.enabled = !value.eq_ignore_ascii_case("off");
        }

        if let Some((_, value)) = get("CHAINDNS_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(value));
        }

        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(invalid(var, value, "expected a positive number of seconds".into())),
    }
}

fn invalid(var: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    }
}
