//! DNS module - record admission, lookup and ledger statistics

mod resolver;
mod stats;

pub use resolver::*;
pub use stats::*;
