//! Chain integrity verification.
//!
//! A chain is valid when, for every block in order:
//!
//! 1. **Position**: `index` equals its position.
//! 2. **Linkage**: `previous_hash` equals the recomputed hash of the
//!    preceding block, or the genesis sentinel for block 0.
//! 3. **Work**: the recomputed hash starts with `difficulty` zeros.
//! 4. **Contents**: `merkle_root` equals the root recomputed from `events`.
//!
//! The walk stops at the first broken rule.  Signatures are checked
//! separately; they authenticate the author, not the sequence.

use proctorchain_contracts::{
    block::{Block, GENESIS_PREVIOUS_HASH},
    error::ChainViolation,
};

use crate::{
    hash::{block_hash, meets_difficulty},
    merkle::merkle_root,
};

/// Walk `blocks` and report the first integrity violation, if any.
///
/// An empty chain is valid.
pub fn verify_chain(blocks: &[Block], difficulty: usize) -> Result<(), ChainViolation> {
    let mut predecessor_hash: Option<String> = None;

    for (position, block) in blocks.iter().enumerate() {
        let index = block.index;
        if index != position as u64 {
            return Err(ChainViolation::IndexOutOfSequence {
                position: position as u64,
                index,
            });
        }

        match &predecessor_hash {
            None if block.previous_hash != GENESIS_PREVIOUS_HASH => {
                return Err(ChainViolation::GenesisLink);
            }
            Some(expected) if block.previous_hash != *expected => {
                return Err(ChainViolation::PreviousHashMismatch { index });
            }
            _ => {}
        }

        let hash = block_hash(block).map_err(|e| ChainViolation::Unhashable {
            index,
            reason: e.to_string(),
        })?;
        if !meets_difficulty(&hash, difficulty) {
            return Err(ChainViolation::InsufficientWork { index });
        }

        let root = merkle_root(&block.events).map_err(|e| ChainViolation::Unhashable {
            index,
            reason: e.to_string(),
        })?;
        if root != block.merkle_root {
            return Err(ChainViolation::MerkleRootMismatch { index });
        }

        predecessor_hash = Some(hash);
    }

    Ok(())
}

/// Boolean form of [`verify_chain`].
pub fn is_valid_chain(blocks: &[Block], difficulty: usize) -> bool {
    verify_chain(blocks, difficulty).is_ok()
}
