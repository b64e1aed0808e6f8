//! Transaction types and admission checks

mod transaction;

pub use transaction::*;
