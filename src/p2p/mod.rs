//! P2P networking module - peer registry, chain exchange and consensus

mod peer;
mod protocol;
mod resolver;

pub use peer::*;
pub use protocol::*;
pub use resolver::*;
