//! ChainDNS Core Library
//!
//! Hostname records stored in an append-only, proof-of-work ledger that
//! each node replicates by adopting the longest valid chain among its
//! peers. Lookups resolve a hostname to its most recently mined address.

pub mod api;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod dns;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod security;
pub mod storage;
pub mod validation;

/// Protocol constants
pub mod constants {
    /// Index of the genesis block
    pub const GENESIS_INDEX: u64 = 1;

    /// Proof recorded in every genesis block
    pub const GENESIS_PROOF: u64 = 100;

    /// Chain name used in logs and the liveness route
    pub const CHAIN_NAME: &str = "ChainDNS";

    /// Route peers serve their full chain on
    pub const CHAIN_ROUTE: &str = "/nodes/chain";

    /// Number of recent threats reported by threat statistics
    pub const RECENT_THREATS: usize = 10;

    /// Default length of the security feed
    pub const SECURITY_FEED_LIMIT: usize = 50;
}
