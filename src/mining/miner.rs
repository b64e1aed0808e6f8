//! Block miner implementation
//!
//! Searches for a proof chained off the current tail and assembles the
//! candidate block around it.

use crate::consensus::{valid_proof, Block, Difficulty};
use crate::crypto::Hash;
use crate::node::unix_timestamp;
use crate::validation::Transaction;
use tracing::trace;

/// Attempts between progress traces
const PROGRESS_INTERVAL: u64 = 1 << 20;

/// Block miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Identifier written into every mined block
    source: String,
    /// Leading zero hex digits required of a proof hash
    difficulty: Difficulty,
}

impl Miner {
    /// Create a new miner
    pub fn new(source: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            source: source.into(),
            difficulty,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Find a proof for the block following one with `previous_proof`
    /// and `previous_hash`.
    ///
    /// Scans upward from zero and returns the first success, so the
    /// result is fully determined by the inputs.
    pub fn mine(&self, previous_proof: u64, previous_hash: &Hash) -> u64 {
        let mut proof = 0u64;
        while !valid_proof(previous_proof, proof, previous_hash, self.difficulty) {
            proof = proof.wrapping_add(1);
            if proof % PROGRESS_INTERVAL == 0 {
                trace!(attempts = proof, "proof search in progress");
            }
        }
        proof
    }

    /// Assemble a block on top of `tail` with an already found proof
    pub fn assemble_block(&self, tail: &Block, transactions: Vec<Transaction>, proof: u64) -> Block {
        Block::new(
            tail.index + 1,
            unix_timestamp(),
            transactions,
            proof,
            tail.hash(),
            self.source.clone(),
        )
    }

    /// Search a proof against `tail` and build the block
    pub fn mine_on(&self, tail: &Block, transactions: Vec<Transaction>) -> Block {
        let proof = self.mine(tail.proof, &tail.hash());
        self.assemble_block(tail, transactions, proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::validate_link;
    use crate::node::create_genesis_block;
    use crate::validation::DnsRecord;

    fn miner() -> Miner {
        Miner::new("miner-1", Difficulty::new(2).unwrap())
    }

    #[test]
    fn test_mined_proof_is_valid() {
        let m = miner();
        let prev = crate::crypto::hash_bytes(b"tail");
        let proof = m.mine(100, &prev);
        assert!(valid_proof(100, proof, &prev, m.difficulty()));
    }

    #[test]
    fn test_mine_returns_first_solution() {
        let m = miner();
        let prev = crate::crypto::hash_bytes(b"tail");
        let proof = m.mine(100, &prev);
        for earlier in 0..proof {
            assert!(!valid_proof(100, earlier, &prev, m.difficulty()));
        }
        // Same inputs, same outcome
        assert_eq!(m.mine(100, &prev), proof);
    }

    #[test]
    fn test_mine_on_links_to_tail() {
        let m = miner();
        let genesis = create_genesis_block("miner-1", 0);
        let tx: Transaction = DnsRecord::new("a.example", "10.1.1.1", 53).into();
        let block = m.mine_on(&genesis, vec![tx.clone()]);

        assert_eq!(block.index, genesis.index + 1);
        assert_eq!(block.previous_hash, genesis.hash());
        assert_eq!(block.transactions, vec![tx]);
        assert_eq!(block.source, "miner-1");
        assert!(validate_link(&genesis, &block, 1, m.difficulty()).is_ok());
    }
}
