//! Consensus resolver: longest valid chain wins
//!
//! Peers are polled one after another. A peer that cannot be reached or
//! serves an invalid chain is skipped; it never aborts the round.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consensus::{Chain, ValidationError};
use crate::storage::Blockchain;
use super::ChainSource;

/// Reasons a peer's chain was not considered
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },
    #[error("Peer {peer} sent an invalid chain: {reason}")]
    InvalidChain { peer: String, reason: String },
    #[error("Peer {peer} chain failed validation: {source}")]
    ValidationFailure {
        peer: String,
        #[source]
        source: ValidationError,
    },
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ConsensusError {
    /// Peer the error concerns, if any
    pub fn peer(&self) -> Option<&str> {
        match self {
            Self::PeerUnreachable { peer, .. }
            | Self::InvalidChain { peer, .. }
            | Self::ValidationFailure { peer, .. } => Some(peer),
            Self::HttpClient(_) => None,
        }
    }
}

/// Result of one consensus round
#[derive(Debug)]
pub struct ResolveOutcome {
    /// Whether the local chain was replaced
    pub replaced: bool,
    /// Local chain length after the round
    pub length: usize,
    /// Peers that were skipped and why
    pub skipped: Vec<ConsensusError>,
}

impl ResolveOutcome {
    /// Addresses of the peers that were skipped
    pub fn skipped_peers(&self) -> Vec<&str> {
        self.skipped.iter().filter_map(ConsensusError::peer).collect()
    }
}

/// Fetch a peer's chain and validate it from genesis
pub async fn fetch_valid_chain(
    source: &dyn ChainSource,
    peer: &str,
    blockchain: &Blockchain,
) -> Result<Chain, ConsensusError> {
    let response = source.fetch_chain(peer).await?;
    response.check_length(peer)?;
    Chain::validated(response.chain, blockchain.difficulty()).map_err(|source| {
        ConsensusError::ValidationFailure {
            peer: peer.to_string(),
            source,
        }
    })
}

/// Poll every registered peer and adopt the longest valid chain that is
/// strictly longer than the local one
///
/// Ties keep the local chain. Among peers of equal length the first one
/// polled wins.
pub async fn resolve_conflicts(blockchain: &Blockchain, source: &dyn ChainSource) -> ResolveOutcome {
    let peers = blockchain.nodes();
    let mut best: Option<Chain> = None;
    let mut skipped = Vec::new();

    for peer in &peers {
        let candidate = match fetch_valid_chain(source, peer, blockchain).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(%peer, error = %e, "skipping peer");
                skipped.push(e);
                continue;
            }
        };

        let to_beat = best.as_ref().map_or_else(|| blockchain.len(), Chain::len);
        debug!(%peer, length = candidate.len(), to_beat, "peer chain is valid");
        if candidate.len() > to_beat {
            best = Some(candidate);
        }
    }

    // The local chain may have grown while peers were polled; adoption
    // re-checks length under the write lock.
    let replaced = best.map_or(false, |chain| blockchain.adopt_if_longer(chain));
    let length = blockchain.len();
    info!(peers = peers.len(), skipped = skipped.len(), replaced, length, "consensus round finished");

    ResolveOutcome {
        replaced,
        length,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Block, Difficulty};
    use crate::crypto::Hash;
    use crate::node::create_genesis_block;
    use crate::p2p::ChainResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn easy() -> Difficulty {
        Difficulty::new(1).unwrap()
    }

    /// Serves canned responses keyed by peer address
    struct FakePeers(HashMap<String, ChainResponse>);

    #[async_trait]
    impl ChainSource for FakePeers {
        async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ConsensusError> {
            self.0.get(peer).cloned().ok_or_else(|| ConsensusError::PeerUnreachable {
                peer: peer.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    fn grown(genesis: &Block, node: &str, len: usize) -> Blockchain {
        let ledger = Blockchain::with_genesis(genesis.clone(), node, easy());
        while ledger.len() < len {
            ledger.mine_block();
        }
        ledger
    }

    #[tokio::test]
    async fn test_adopts_longer_valid_chain() {
        let genesis = create_genesis_block("g", 1);
        let local = grown(&genesis, "local", 2);
        let peer = grown(&genesis, "peer", 4);
        local.register_node("10.0.0.9:5001").unwrap();

        let source = FakePeers(HashMap::from([(
            "10.0.0.9:5001".to_string(),
            ChainResponse::from_chain(&peer.chain()),
        )]));

        let outcome = resolve_conflicts(&local, &source).await;
        assert!(outcome.replaced);
        assert_eq!(outcome.length, 4);
        assert_eq!(local.chain(), peer.chain());
    }

    #[tokio::test]
    async fn test_unreachable_and_broken_peers_are_skipped() {
        let genesis = create_genesis_block("g", 1);
        let local = grown(&genesis, "local", 2);
        let peer = grown(&genesis, "peer", 5);

        let mut broken = ChainResponse::from_chain(&peer.chain());
        broken.chain[3].previous_hash = Hash::zero();

        local.register_node("10.0.0.1:5001").unwrap();
        local.register_node("10.0.0.2:5001").unwrap();
        let source = FakePeers(HashMap::from([("10.0.0.2:5001".to_string(), broken)]));

        let before = local.chain();
        let outcome = resolve_conflicts(&local, &source).await;

        assert!(!outcome.replaced);
        assert_eq!(local.chain(), before);
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome
            .skipped
            .iter()
            .any(|e| matches!(e, ConsensusError::ValidationFailure { .. })));
        assert!(outcome
            .skipped
            .iter()
            .any(|e| matches!(e, ConsensusError::PeerUnreachable { .. })));

        let mut peers = outcome.skipped_peers();
        peers.sort_unstable();
        assert_eq!(peers, ["10.0.0.1:5001", "10.0.0.2:5001"]);
    }

    #[tokio::test]
    async fn test_equal_length_keeps_local() {
        let genesis = create_genesis_block("g", 1);
        let local = grown(&genesis, "local", 3);
        let peer = grown(&genesis, "peer", 3);
        local.register_node("10.0.0.3:5001").unwrap();

        let source = FakePeers(HashMap::from([(
            "10.0.0.3:5001".to_string(),
            ChainResponse::from_chain(&peer.chain()),
        )]));

        let before = local.chain();
        let outcome = resolve_conflicts(&local, &source).await;
        assert!(!outcome.replaced);
        assert_eq!(local.chain(), before);
    }

    #[tokio::test]
    async fn test_no_peers_is_a_noop() {
        let local = Blockchain::new("alone", easy());
        let outcome = resolve_conflicts(&local, &FakePeers(HashMap::new())).await;
        assert!(!outcome.replaced);
        assert_eq!(outcome.length, 1);
        assert!(outcome.skipped.is_empty());
    }
}
