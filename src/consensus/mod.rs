//! Consensus module - Block structure, proof of work, and chain validation

mod block;
mod chain;
mod pow;
mod validation;

pub use block::*;
pub use chain::*;
pub use pow::*;
pub use validation::*;
