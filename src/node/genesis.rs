//! Genesis block generation
//!
//! Every node creates its own genesis at start-up. Nodes converge on one
//! history through consensus, which replaces chains wholesale, genesis
//! included.

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::constants::{GENESIS_INDEX, GENESIS_PROOF};

/// Create the genesis block
///
/// Empty transaction list, the all-zero previous-hash sentinel and a
/// fixed proof. Two calls with equal arguments produce identical blocks.
pub fn create_genesis_block(node_id: &str, timestamp: u64) -> Block {
    Block::new(
        GENESIS_INDEX,
        timestamp,
        Vec::new(),
        GENESIS_PROOF,
        Hash::zero(),
        node_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_deterministic() {
        let genesis1 = create_genesis_block("node", 42);
        let genesis2 = create_genesis_block("node", 42);
        assert_eq!(genesis1.hash(), genesis2.hash());
    }

    #[test]
    fn test_genesis_shape() {
        let genesis = create_genesis_block("node", 42);
        assert!(genesis.is_genesis());
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.index, GENESIS_INDEX);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.source, "node");
    }

    #[test]
    fn test_genesis_differs_per_node() {
        assert_ne!(
            create_genesis_block("a", 1).hash(),
            create_genesis_block("b", 1).hash()
        );
    }
}
