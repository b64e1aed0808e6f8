//! Database persistence layer using Sled
//!
//! Keeps a snapshot of the chain on disk so a restarted node resumes
//! from its last known history. Blocks are stored as JSON keyed by their
//! big-endian position, so tree order is chain order.

use sled::{Batch, Db, Tree};
use std::path::Path;
use thiserror::Error;
use crate::consensus::{Block, Chain};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sled::Error),
    #[error("Block encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Database wrapper
#[derive(Debug, Clone)]
pub struct ChainDb {
    db: Db,
    blocks_tree: Tree,
}

fn position_key(position: usize) -> [u8; 8] {
    (position as u64).to_be_bytes()
}

impl ChainDb {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let blocks_tree = db.open_tree("blocks")?;
        Ok(Self { db, blocks_tree })
    }

    /// Save a block at `position` (zero-based)
    pub fn save_block(&self, position: usize, block: &Block) -> Result<(), StorageError> {
        let value = serde_json::to_vec(block)?;
        self.blocks_tree.insert(position_key(position), value)?;
        self.db.flush()?;
        Ok(())
    }

    /// Overwrite the stored chain in one atomic batch
    pub fn replace_chain(&self, chain: &Chain) -> Result<(), StorageError> {
        let mut batch = Batch::default();
        for (position, block) in chain.iter().enumerate() {
            batch.insert(&position_key(position), serde_json::to_vec(block)?);
        }
        // Drop leftovers from a longer previous chain
        for entry in self.blocks_tree.range(position_key(chain.len())..) {
            let (key, _) = entry?;
            batch.remove(key);
        }
        self.blocks_tree.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load every stored block in chain order
    pub fn load_blocks(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::with_capacity(self.blocks_tree.len());
        for entry in self.blocks_tree.iter() {
            let (_, value) = entry?;
            blocks.push(serde_json::from_slice(&value)?);
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Difficulty;
    use crate::mining::Miner;
    use crate::node::create_genesis_block;
    use crate::validation::DnsRecord;

    fn chain_of(len: usize) -> Chain {
        let miner = Miner::new("db-test", Difficulty::new(1).unwrap());
        let mut chain = Chain::new(create_genesis_block("db-test", 7));
        while chain.len() < len {
            let tx = DnsRecord::new(format!("h{}", chain.len()), "10.0.0.2", 80).into();
            let block = miner.mine_on(chain.tail(), vec![tx]);
            chain.append(block);
        }
        chain
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();
        let chain = chain_of(3);

        for (position, block) in chain.iter().enumerate() {
            db.save_block(position, block).unwrap();
        }

        let loaded = db.load_blocks().unwrap();
        assert_eq!(loaded, chain.blocks());
    }

    #[test]
    fn test_replace_with_shorter_chain_drops_tail() {
        let dir = tempfile::tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();

        db.replace_chain(&chain_of(4)).unwrap();
        let shorter = chain_of(2);
        db.replace_chain(&shorter).unwrap();

        assert_eq!(db.load_blocks().unwrap(), shorter.blocks());
    }

    #[test]
    fn test_empty_db_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = ChainDb::open(dir.path()).unwrap();
        assert!(db.load_blocks().unwrap().is_empty());
    }
}
