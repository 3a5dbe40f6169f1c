//! # proctorchain-core
//!
//! The hashing and sealing engine of the proctorchain event ledger.
//!
//! This crate provides:
//! - Canonical JSON encoding, the input to every digest and signature
//! - The Merkle aggregator that reduces an event batch to one root
//! - The `Miner`, which assembles blocks and runs the bounded nonce search
//! - `verify_chain`, the fail-fast integrity walk
//! - The `BlockStore` and `BlockSigner` traits the ledger is built on
//!
//! ## Usage
//!
//! ```rust,ignore
//! use proctorchain_core::{Miner, verify_chain};
//!
//! let miner = Miner::new(4, 1_000_000);
//! let mined = miner.mine(events, chain.last())?;
//! chain.push(mined.block);
//! assert!(verify_chain(&chain, 4).is_ok());
//! ```

pub mod canonical;
pub mod chain;
pub mod hash;
pub mod merkle;
pub mod miner;
pub mod traits;

#[cfg(test)]
mod test_vectors;

pub use chain::{is_valid_chain, verify_chain};
pub use hash::{block_hash, meets_difficulty, signing_payload};
pub use merkle::merkle_root;
pub use miner::{MinedBlock, Miner, DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS, MAX_DIFFICULTY};
pub use traits::{BlockSigner, BlockStore};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use proctorchain_contracts::Block;

    use crate::{
        canonical::to_canonical_string,
        hash::{block_hash, event_hash, signing_payload},
        test_vectors::*,
    };

    /// Event encodings must match those of previously persisted chains.
    #[test]
    fn event_encoding_matches_persisted_chains() {
        let events = sample_events();
        assert_eq!(to_canonical_string(&events[0]).unwrap(), CANONICAL_FIRST_EVENT);
        assert_eq!(to_canonical_string(&events[2]).unwrap(), CANONICAL_THIRD_EVENT);
        assert_eq!(event_hash(&events[0]).unwrap(), ROOT_OF_FIRST_EVENT);
    }

    /// The block hash covers all six fields with the persisted encoding.
    #[test]
    fn block_hash_matches_persisted_chains() {
        assert_eq!(block_hash(&sample_block()).unwrap(), HASH_OF_SAMPLE_BLOCK);
    }

    /// Recomputing a hash never changes it.
    #[test]
    fn block_hash_is_idempotent() {
        let block = sample_block();
        let first = block_hash(&block).unwrap();
        for _ in 0..5 {
            assert_eq!(block_hash(&block).unwrap(), first);
        }
    }

    /// Every field participates in the block hash.
    #[test]
    fn every_block_field_changes_hash() {
        let original = block_hash(&sample_block()).unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Block)>> = vec![
            Box::new(|b: &mut Block| b.index += 1),
            Box::new(|b: &mut Block| b.timestamp += 0.001),
            Box::new(|b: &mut Block| b.events.truncate(2)),
            Box::new(|b: &mut Block| b.previous_hash = "1".repeat(64)),
            Box::new(|b: &mut Block| b.merkle_root = "2".repeat(64)),
            Box::new(|b: &mut Block| b.nonce += 1),
        ];
        for mutate in mutations {
            let mut block = sample_block();
            mutate(&mut block);
            assert_ne!(block_hash(&block).unwrap(), original);
        }
    }

    /// The signature payload is the header only, keys sorted.
    #[test]
    fn signing_payload_excludes_events() {
        let payload = signing_payload(&sample_block()).unwrap();
        assert_eq!(
            payload,
            concat!(
                r#"{"index": 1, "merkle_root": "62510b54a4d949edbe6fe904222f669b5194585c09460d5dd67ba13eb4cc1e0e", "#,
                r#""nonce": 42, "previous_hash": "0000000000000000000000000000000000000000000000000000000000000000", "#,
                r#""timestamp": 1700000005.125}"#
            )
        );
    }
}
