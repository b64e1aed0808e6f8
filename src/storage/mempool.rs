//! Pending transaction buffer
//!
//! Admitted transactions wait here until the next block is mined. The
//! buffer is only ever drained as a whole.

use crate::validation::Transaction;

#[derive(Debug, Default, Clone)]
pub struct TransactionBuffer {
    pending: Vec<Transaction>,
}

impl TransactionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction. No de-duplication against the buffer or
    /// the chain: repeated records form a changelog.
    pub fn submit(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    /// Take every pending transaction in submission order and leave the
    /// buffer empty
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.pending)
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
