//! Ledger state management
//!
//! `Blockchain` owns the local chain, the pending buffer and the peer
//! registry. Every mutation goes through it so that draining the buffer
//! into a new block, and swapping in a peer's chain, are each seen as a
//! single step by concurrent submitters and readers.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::consensus::{validate_chain, Block, Chain, Difficulty};
use crate::mining::Miner;
use crate::node::{create_genesis_block, unix_timestamp};
use crate::p2p::{NodeRegistry, RegistryError};
use crate::validation::Transaction;
use super::{ChainDb, TransactionBuffer};

/// Replicated ledger of one node
#[derive(Debug)]
pub struct Blockchain {
    chain: RwLock<Chain>,
    buffer: Mutex<TransactionBuffer>,
    nodes: RwLock<NodeRegistry>,
    miner: Miner,
    db: Option<ChainDb>,
}

impl Blockchain {
    /// Fresh in-memory ledger with a genesis block stamped now
    pub fn new(node_id: &str, difficulty: Difficulty) -> Self {
        Self::with_genesis(create_genesis_block(node_id, unix_timestamp()), node_id, difficulty)
    }

    /// In-memory ledger starting from a given genesis block.
    ///
    /// Nodes that must agree from the start share their genesis this way.
    pub fn with_genesis(genesis: Block, node_id: &str, difficulty: Difficulty) -> Self {
        Self {
            chain: RwLock::new(Chain::new(genesis)),
            buffer: Mutex::new(TransactionBuffer::new()),
            nodes: RwLock::new(NodeRegistry::new()),
            miner: Miner::new(node_id, difficulty),
            db: None,
        }
    }

    /// Ledger backed by an on-disk snapshot
    ///
    /// Resumes from the stored chain if it still validates, otherwise
    /// starts over from a new genesis and overwrites the snapshot.
    pub fn open(node_id: &str, difficulty: Difficulty, db: ChainDb) -> Self {
        let stored = match db.load_blocks() {
            Ok(blocks) if !blocks.is_empty() => match Chain::validated(blocks, difficulty) {
                Ok(chain) => Some(chain),
                Err(e) => {
                    warn!(error = %e, "stored chain failed validation, starting from genesis");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "could not read stored chain, starting from genesis");
                None
            }
        };

        let chain = match stored {
            Some(chain) => {
                info!(length = chain.len(), "resumed chain from disk");
                chain
            }
            None => {
                let chain = Chain::new(create_genesis_block(node_id, unix_timestamp()));
                if let Err(e) = db.replace_chain(&chain) {
                    warn!(error = %e, "failed to persist genesis block");
                }
                chain
            }
        };

        Self {
            chain: RwLock::new(chain),
            buffer: Mutex::new(TransactionBuffer::new()),
            nodes: RwLock::new(NodeRegistry::new()),
            miner: Miner::new(node_id, difficulty),
            db: Some(db),
        }
    }

    pub fn node_id(&self) -> &str {
        self.miner.source()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.miner.difficulty()
    }

    // Every mutation is a single push or swap, so poisoned data is still
    // consistent.
    fn read_chain(&self) -> RwLockReadGuard<'_, Chain> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_chain(&self) -> RwLockWriteGuard<'_, Chain> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, TransactionBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- chain ----

    /// Run `f` against the current chain under a read lock
    pub fn with_chain<R>(&self, f: impl FnOnce(&Chain) -> R) -> R {
        f(&self.read_chain())
    }

    /// Clone of the current chain
    pub fn chain(&self) -> Chain {
        self.read_chain().clone()
    }

    pub fn len(&self) -> usize {
        self.read_chain().len()
    }

    /// Always false: a ledger holds at least its genesis block
    pub fn is_empty(&self) -> bool {
        self.read_chain().is_empty()
    }

    pub fn last_block(&self) -> Block {
        self.read_chain().tail().clone()
    }

    // ---- pending buffer ----

    /// Queue a transaction for the next block
    pub fn submit(&self, tx: Transaction) {
        self.lock_buffer().submit(tx);
    }

    /// Run `f` against the pending transactions under the buffer lock
    pub fn with_pending<R>(&self, f: impl FnOnce(&[Transaction]) -> R) -> R {
        f(self.lock_buffer().as_slice())
    }

    /// Copy of the pending transactions in submission order
    pub fn pending(&self) -> Vec<Transaction> {
        self.with_pending(<[Transaction]>::to_vec)
    }

    pub fn pending_len(&self) -> usize {
        self.lock_buffer().len()
    }

    // ---- mining ----

    /// Seal every pending transaction into a new block and append it
    ///
    /// The buffer is drained exactly once. The proof search runs without
    /// holding any lock; if the tail moved meanwhile (a peer chain was
    /// adopted) the proof is searched again against the new tail, so the
    /// drained transactions always land in the appended block.
    ///
    /// This blocks for as long as the proof search takes.
    pub fn mine_block(&self) -> Block {
        self.mine_block_with(|| {})
    }

    /// `after_search` runs after each proof search, before the tail is
    /// checked again
    fn mine_block_with(&self, mut after_search: impl FnMut()) -> Block {
        let transactions = self.lock_buffer().drain();

        loop {
            let tail = self.last_block();
            let tail_hash = tail.hash();
            let proof = self.miner.mine(tail.proof, &tail_hash);
            after_search();

            let mut chain = self.write_chain();
            if chain.tip_hash() != tail_hash {
                debug!(index = tail.index + 1, "tail changed during proof search, mining again");
                continue;
            }

            let block = self.miner.assemble_block(&tail, transactions, proof);
            chain.append(block.clone());
            self.persist_block(chain.len() - 1, &block);

            info!(
                index = block.index,
                proof = block.proof,
                transactions = block.transactions.len(),
                "mined block"
            );
            return block;
        }
    }

    // ---- consensus ----

    /// Replace the local chain with `candidate` if it is strictly longer
    ///
    /// The candidate is re-validated here, so a chain assembled elsewhere
    /// can never bypass the proof and link checks.
    pub fn adopt_if_longer(&self, candidate: Chain) -> bool {
        if let Err(e) = validate_chain(candidate.blocks(), self.difficulty()) {
            warn!(error = %e, "refusing to adopt invalid chain");
            return false;
        }

        let mut chain = self.write_chain();
        if candidate.len() <= chain.len() {
            return false;
        }

        info!(from = chain.len(), to = candidate.len(), "adopting longer chain");
        *chain = candidate;
        if let Some(db) = &self.db {
            if let Err(e) = db.replace_chain(&chain) {
                warn!(error = %e, "failed to persist adopted chain");
            }
        }
        true
    }

    fn persist_block(&self, position: usize, block: &Block) {
        if let Some(db) = &self.db {
            if let Err(e) = db.save_block(position, block) {
                warn!(error = %e, index = block.index, "failed to persist block");
            }
        }
    }

    // ---- peers ----

    /// Register a peer; `Ok(true)` if it was new
    pub fn register_node(&self, address: &str) -> Result<bool, RegistryError> {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(address)
    }

    /// Known peers in sorted order
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).peers()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::is_valid_chain;
    use crate::validation::DnsRecord;
    use std::sync::Arc;
    use std::thread;

    fn easy() -> Difficulty {
        Difficulty::new(1).unwrap()
    }

    fn record(host: &str, port: u16) -> Transaction {
        DnsRecord::new(host, "10.0.0.1", port).into()
    }

    #[test]
    fn test_new_ledger_holds_genesis() {
        let ledger = Blockchain::new("node-a", easy());
        assert_eq!(ledger.len(), 1);
        let genesis = ledger.last_block();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.source, "node-a");
    }

    #[test]
    fn test_mine_block_drains_buffer() {
        let ledger = Blockchain::new("node-a", easy());
        ledger.submit(record("a.example", 1));
        ledger.submit(record("b.example", 2));

        let block = ledger.mine_block();

        assert_eq!(block.index, 2);
        assert_eq!(block.transactions, vec![record("a.example", 1), record("b.example", 2)]);
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(ledger.len(), 2);
        assert!(is_valid_chain(ledger.chain().blocks(), easy()));
    }

    #[test]
    fn test_mine_empty_block_is_allowed() {
        let ledger = Blockchain::new("node-a", easy());
        let block = ledger.mine_block();
        assert!(block.transactions.is_empty());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_adopt_only_strictly_longer() {
        let genesis = create_genesis_block("shared", 1);
        let local = Blockchain::with_genesis(genesis.clone(), "local", easy());
        let peer = Blockchain::with_genesis(genesis, "peer", easy());
        local.mine_block();
        peer.mine_block();

        assert!(!local.adopt_if_longer(peer.chain()));

        peer.mine_block();
        assert!(local.adopt_if_longer(peer.chain()));
        assert_eq!(local.chain(), peer.chain());
    }

    #[test]
    fn test_submissions_during_mining_are_not_lost() {
        let ledger = Arc::new(Blockchain::new("node-a", easy()));

        let submitter = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for port in 0..200 {
                    ledger.submit(record("busy.example", port));
                }
            })
        };

        let mut mined = 0;
        for _ in 0..5 {
            mined += ledger.mine_block().transactions.len();
        }
        submitter.join().unwrap();
        mined += ledger.pending_len();

        assert_eq!(mined, 200);
        assert!(is_valid_chain(ledger.chain().blocks(), easy()));
    }

    #[test]
    fn test_mining_retargets_when_chain_is_adopted_mid_search() {
        let genesis = create_genesis_block("shared", 1);
        let local = Blockchain::with_genesis(genesis.clone(), "local", easy());
        let peer = Blockchain::with_genesis(genesis, "peer", easy());
        for port in 0..3 {
            peer.submit(record("peer.example", port));
            peer.mine_block();
        }
        let adopted_tail = peer.last_block();

        local.submit(record("a.example", 1));
        local.submit(record("b.example", 2));

        let mut searches = 0;
        let block = local.mine_block_with(|| {
            searches += 1;
            if searches == 1 {
                assert!(local.adopt_if_longer(peer.chain()));
            }
        });

        assert_eq!(searches, 2);
        assert_eq!(block.previous_hash, adopted_tail.hash());
        assert_eq!(block.index, adopted_tail.index + 1);
        assert_eq!(local.len(), peer.len() + 1);
        assert_eq!(local.last_block(), block);
        assert!(is_valid_chain(local.chain().blocks(), easy()));

        let chain = local.chain();
        let sealed: Vec<_> = chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.hostname() != "peer.example")
            .collect();
        assert_eq!(sealed, [&record("a.example", 1), &record("b.example", 2)]);
        assert_eq!(local.pending_len(), 0);
    }

    #[test]
    fn test_register_node() {
        let ledger = Blockchain::new("node-a", easy());
        assert!(ledger.register_node("127.0.0.1:5002").unwrap());
        assert!(!ledger.register_node("http://127.0.0.1:5002").unwrap());
        assert!(ledger.register_node("nope nope").is_err());
        assert_eq!(ledger.nodes(), vec!["127.0.0.1:5002".to_string()]);
        assert_eq!(ledger.node_count(), 1);
    }

    #[test]
    fn test_reopen_resumes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mined = {
            let ledger = Blockchain::open("node-a", easy(), ChainDb::open(dir.path()).unwrap());
            ledger.submit(record("disk.example", 9));
            ledger.mine_block();
            ledger.chain()
        };

        let reopened = Blockchain::open("node-a", easy(), ChainDb::open(dir.path()).unwrap());
        assert_eq!(reopened.chain(), mined);
    }
}
