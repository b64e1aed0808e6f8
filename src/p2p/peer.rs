//! Peer registry
//!
//! The local node's address book. Peers only enter through explicit
//! registration and are never evicted; unreachable peers are simply
//! skipped during consensus.

use std::collections::BTreeSet;
use thiserror::Error;
use url::Url;

/// Registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid peer address: {0:?}")]
    InvalidAddress(String),
}

/// Normalize a peer address to `host:port`
///
/// Accepts a bare `host:port` or a full `http(s)://host:port/...` URL.
/// Missing ports fall back to the scheme default.
pub fn normalize_address(raw: &str) -> Result<String, RegistryError> {
    let invalid = || RegistryError::InvalidAddress(raw.to_string());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }

    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let port = url.port_or_known_default().ok_or_else(invalid)?;

    Ok(format!("{host}:{port}"))
}

/// Deduplicated set of known peers
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    peers: BTreeSet<String>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert a peer address
    ///
    /// Returns `true` if the peer was not known before. Malformed
    /// addresses leave the registry unchanged.
    pub fn register(&mut self, address: &str) -> Result<bool, RegistryError> {
        let normalized = normalize_address(address)?;
        Ok(self.peers.insert(normalized))
    }

    /// All known peers in sorted order
    pub fn peers(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_address() {
        assert_eq!(normalize_address("127.0.0.1:5002").unwrap(), "127.0.0.1:5002");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_address("http://127.0.0.1:5002/nodes/chain").unwrap(),
            "127.0.0.1:5002"
        );
        assert_eq!(normalize_address("http://Example.COM").unwrap(), "example.com:80");
        assert_eq!(normalize_address("https://peer.local").unwrap(), "peer.local:443");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        for raw in ["", "   ", "not a host", "host:port", "ftp://x:21", "127.0.0.1:99999"] {
            assert!(
                matches!(normalize_address(raw), Err(RegistryError::InvalidAddress(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = NodeRegistry::new();
        assert!(registry.register("127.0.0.1:5002").unwrap());
        assert!(!registry.register("http://127.0.0.1:5002").unwrap());
        assert!(!registry.register(" 127.0.0.1:5002 ").unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_address_leaves_registry_unchanged() {
        let mut registry = NodeRegistry::new();
        registry.register("127.0.0.1:5002").unwrap();
        assert!(registry.register("::::").is_err());
        assert_eq!(registry.peers(), vec!["127.0.0.1:5002".to_string()]);
    }
}
