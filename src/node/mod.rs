//! Node module - genesis block and node identity

mod genesis;
mod identity;

pub use genesis::*;
pub use identity::*;
