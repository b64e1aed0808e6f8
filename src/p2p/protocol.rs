//! Peer-to-peer chain exchange
//!
//! A peer asked for its chain answers with its length and the full block
//! sequence. The requester recomputes every hash and proof itself; the
//! peer's word on validity is never trusted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consensus::{Block, Chain};
use crate::constants::CHAIN_ROUTE;
use crate::p2p::ConsensusError;

/// Wire form of a full chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    /// Number of blocks the peer claims to hold
    pub length: usize,
    /// Blocks from genesis to tail
    pub chain: Vec<Block>,
}

impl ChainResponse {
    pub fn from_chain(chain: &Chain) -> Self {
        Self {
            length: chain.len(),
            chain: chain.blocks().to_vec(),
        }
    }

    /// Reject responses whose claimed length disagrees with their content
    pub fn check_length(&self, peer: &str) -> Result<(), ConsensusError> {
        if self.length != self.chain.len() {
            return Err(ConsensusError::InvalidChain {
                peer: peer.to_string(),
                reason: format!(
                    "claimed length {} but sent {} blocks",
                    self.length,
                    self.chain.len()
                ),
            });
        }
        Ok(())
    }
}

/// Where consensus gets peer chains from
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Fetch the full chain of `peer` (a normalized `host:port`)
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ConsensusError>;
}

/// Fetches chains over HTTP from the peer's chain route
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: Client,
}

impl HttpChainSource {
    /// Every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ConsensusError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsensusError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    fn endpoint(peer: &str) -> String {
        format!("http://{peer}{CHAIN_ROUTE}")
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ConsensusError> {
        let url = Self::endpoint(peer);
        debug!(%url, "fetching peer chain");

        let unreachable = |reason: String| ConsensusError::PeerUnreachable {
            peer: peer.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP status {status}")));
        }

        response
            .json::<ChainResponse>()
            .await
            .map_err(|e| ConsensusError::InvalidChain {
                peer: peer.to_string(),
                reason: format!("malformed chain response: {e}"),
            })
    }
}
