//! Mining module - proof search and block assembly

mod miner;

pub use miner::*;
