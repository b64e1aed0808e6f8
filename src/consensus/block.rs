//! Block structure for the DNS ledger
//!
//! A block's hash covers every field, its own proof included. The next
//! block references that hash as `previous_hash`.

use serde::{Deserialize, Serialize};
use crate::crypto::{hash_bytes, Hash};
use crate::validation::{put_str, Transaction};

/// A hash-linked unit of the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    /// Position in the chain, genesis is 1
    pub index: u64,
    /// Creation time on the mining node (seconds since Unix epoch)
    pub timestamp: u64,
    /// Transactions in mining order
    pub transactions: Vec<Transaction>,
    /// Proof-of-work solution relative to the previous block
    pub proof: u64,
    /// Hash of the preceding block
    pub previous_hash: Hash,
    /// Identifier of the node that mined the block
    pub source: String,
}

impl Block {
    /// Create a new block
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: Hash,
        source: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
            source: source.into(),
        }
    }

    /// Canonical encoding used for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for tx in &self.transactions {
            tx.encode_into(&mut bytes);
        }
        bytes.extend_from_slice(&self.proof.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash.0);
        put_str(&mut bytes, &self.source);
        bytes
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }

    /// Check if this block carries the genesis sentinel
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == Hash::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::DnsRecord;

    fn sample() -> Block {
        Block::new(
            2,
            1_700_000_000,
            vec![DnsRecord::new("example.com", "10.0.0.1", 80).into()],
            35293,
            Hash::zero(),
            "node-a",
        )
    }

    #[test]
    fn test_block_encoding_length() {
        let block = Block::new(1, 0, vec![], 100, Hash::zero(), "");
        // index + timestamp + tx count + proof + prev hash + source length
        assert_eq!(block.to_bytes().len(), 8 + 8 + 4 + 8 + 32 + 4);
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = sample();
        let mut changed = base.clone();
        changed.proof += 1;
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.source = "node-b".into();
        assert_ne!(base.hash(), changed.hash());

        let mut changed = base.clone();
        changed.transactions.clear();
        assert_ne!(base.hash(), changed.hash());
    }

    #[test]
    fn test_json_roundtrip_preserves_hash() {
        let block = sample();
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.hash(), block.hash());
    }

    #[test]
    fn test_genesis_block_detection() {
        assert!(sample().is_genesis());
        let mut block = sample();
        block.previous_hash = hash_bytes(b"parent");
        assert!(!block.is_genesis());
    }
}
