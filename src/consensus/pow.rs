//! Proof-of-work predicate
//!
//! A proof is valid when the BLAKE3 digest of
//! `previous_proof || proof || previous_hash` starts with `difficulty`
//! zero hex digits. Finding one takes about `16^difficulty` attempts,
//! checking one takes a single hash.

use std::fmt;
use crate::crypto::{hash_bytes, Hash};

/// Default number of leading zero hex digits
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Largest accepted difficulty
pub const MAX_DIFFICULTY: u32 = 16;

/// Number of leading zero hex digits a proof hash must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Returns `None` outside `0..=MAX_DIFFICULTY`
    pub const fn new(digits: u32) -> Option<Self> {
        if digits > MAX_DIFFICULTY {
            None
        } else {
            Some(Self(digits))
        }
    }

    pub const fn digits(self) -> u32 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of a proof candidate
pub fn proof_hash(previous_proof: u64, proof: u64, previous_hash: &Hash) -> Hash {
    let mut bytes = Vec::with_capacity(8 + 8 + 32);
    bytes.extend_from_slice(&previous_proof.to_le_bytes());
    bytes.extend_from_slice(&proof.to_le_bytes());
    bytes.extend_from_slice(&previous_hash.0);
    hash_bytes(&bytes)
}

/// Check a proof against its predecessor. Pure and cheap.
pub fn valid_proof(
    previous_proof: u64,
    proof: u64,
    previous_hash: &Hash,
    difficulty: Difficulty,
) -> bool {
    proof_hash(previous_proof, proof, previous_hash).leading_zero_digits() >= difficulty.digits()
}
