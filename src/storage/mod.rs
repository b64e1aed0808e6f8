//! Storage module - pending buffer, ledger state and on-disk snapshot

mod mempool;
mod state;
pub mod db;

pub use mempool::*;
pub use state::*;
pub use db::{ChainDb, StorageError};
