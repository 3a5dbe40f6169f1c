//! Block types.
//!
//! A `Block` seals an ordered batch of events.  Its hash is never stored on
//! the struct; it is recomputed from the six fields below whenever needed
//! (see `proctorchain_core::hash::block_hash`).

use serde::{Deserialize, Serialize};

use crate::event::CheatingEvent;

/// The `previous_hash` of the first block in every chain: 64 zeros.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// An ordered container sealing a batch of events.
///
/// Every serialized field participates in the block hash, and nothing else
/// does.  `nonce` is only changed by the miner, before the block is signed
/// and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, starting at 0.
    pub index: u64,

    /// Creation time in seconds since the Unix epoch.
    pub timestamp: f64,

    /// The sealed events, in the order they were received.
    pub events: Vec<CheatingEvent>,

    /// Hash of the preceding block, or `GENESIS_PREVIOUS_HASH`.
    pub previous_hash: String,

    /// Merkle root over `events`.
    pub merkle_root: String,

    pub nonce: u64,
}

/// How the proof-of-work search for a block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seal {
    /// A nonce meeting the difficulty target was found.
    ProofOfWork,

    /// The attempt budget ran out; the block was accepted with its last
    /// nonce and does not meet the difficulty target.
    AttemptsExhausted,
}

impl Seal {
    pub fn is_sealed(&self) -> bool {
        matches!(self, Seal::ProofOfWork)
    }
}

/// A mined and signed block, ready to be committed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedBlock {
    pub block: Block,

    /// Lowercase hex SHA-256 of the block's canonical encoding.
    pub hash: String,

    /// Base64 signature over the block header.
    pub signature: String,

    pub seal: Seal,
}

/// What the caller learns when a batch is mined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockReceipt {
    pub index: u64,
    pub hash: String,
    pub event_count: usize,
    pub nonce: u64,
    pub seal: Seal,

    /// Wall time spent mining, signing, and committing, in seconds.
    pub mining_time: f64,
}
