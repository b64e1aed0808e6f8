//! Chain validation
//!
//! Pure functions over candidate block sequences. Used before any chain
//! received from a peer (or loaded from disk) replaces local state.

use crate::consensus::{valid_proof, Block, Difficulty};
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Chain has no blocks")]
    EmptyChain,
    #[error("Block at position {position} does not reference its predecessor's hash")]
    PreviousHashMismatch { position: usize },
    #[error("Block at position {position} has an invalid proof of work")]
    InvalidProof { position: usize },
}

/// Validate a single link: `block` must extend `previous`
pub fn validate_link(
    previous: &Block,
    block: &Block,
    position: usize,
    difficulty: Difficulty,
) -> Result<(), ValidationError> {
    let previous_hash = previous.hash();

    if block.previous_hash != previous_hash {
        return Err(ValidationError::PreviousHashMismatch { position });
    }

    if !valid_proof(previous.proof, block.proof, &previous_hash, difficulty) {
        return Err(ValidationError::InvalidProof { position });
    }

    Ok(())
}

/// Walk a full candidate chain from genesis
///
/// Every block after the first must reference its predecessor's hash and
/// carry a proof that satisfies the predicate relative to the
/// predecessor's proof. The genesis block itself is taken as given.
pub fn validate_chain(blocks: &[Block], difficulty: Difficulty) -> Result<(), ValidationError> {
    if blocks.is_empty() {
        return Err(ValidationError::EmptyChain);
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        validate_link(&pair[0], &pair[1], position + 1, difficulty)?;
    }

    Ok(())
}

/// Boolean form of [`validate_chain`]
pub fn is_valid_chain(blocks: &[Block], difficulty: Difficulty) -> bool {
    validate_chain(blocks, difficulty).is_ok()
}
