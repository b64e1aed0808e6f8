//! Ordered block sequence
//!
//! A `Chain` is never empty: it is built either from a fresh genesis
//! block or from a block list that passed [`validate_chain`].

use serde::Serialize;
use crate::consensus::{validate_chain, Block, Difficulty, ValidationError};
use crate::crypto::Hash;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Start a chain from its genesis block
    pub fn new(genesis: Block) -> Self {
        Self { blocks: vec![genesis] }
    }

    /// Adopt a block list after full validation
    pub fn validated(blocks: Vec<Block>, difficulty: Difficulty) -> Result<Self, ValidationError> {
        validate_chain(&blocks, difficulty)?;
        Ok(Self { blocks })
    }

    /// Append a block as the new tail.
    ///
    /// The caller guarantees the block links to the current tail and
    /// carries a valid proof; nothing is re-checked here.
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Last block
    pub fn tail(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Hash of the last block
    pub fn tip_hash(&self) -> Hash {
        self.tail().hash()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::create_genesis_block;

    #[test]
    fn test_new_chain_holds_genesis() {
        let genesis = create_genesis_block("n", 5);
        let chain = Chain::new(genesis.clone());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tail(), &genesis);
        assert_eq!(chain.tip_hash(), genesis.hash());
    }

    #[test]
    fn test_validated_rejects_empty() {
        let err = Chain::validated(Vec::new(), Difficulty::default()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyChain);
    }

    #[test]
    fn test_serializes_as_block_list() {
        let chain = Chain::new(create_genesis_block("n", 5));
        let value = serde_json::to_value(&chain).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 1);
    }
}
