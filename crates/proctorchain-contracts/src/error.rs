//! Error types for the proctorchain ledger.
//!
//! Every fallible ledger operation returns `LedgerResult<T>`.  Integrity
//! failures found while walking the chain are reported as a `ChainViolation`
//! so callers can tell "the chain is broken at block 7" apart from "the
//! database is unreachable".

use thiserror::Error;

/// The unified error type for the proctorchain crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The durable store could not complete a read or a commit.
    #[error("storage error: {reason}")]
    Storage { reason: String },

    /// The chain or an exported document failed an integrity check.
    #[error("integrity violation: {0}")]
    Integrity(#[from] ChainViolation),

    /// Signing or signature verification could not be performed.
    #[error("crypto error: {reason}")]
    Crypto { reason: String },

    /// A key file could not be read, parsed, generated, or written.
    ///
    /// Fatal at startup: a ledger without its signing key is never built.
    #[error("key material error: {reason}")]
    KeyMaterial { reason: String },

    /// A value could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A filesystem operation outside the store failed (export, cleanup).
    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },

    /// An internal lock was poisoned by a panicking thread.
    #[error("lock poisoned: {reason}")]
    LockPoisoned { reason: String },

    /// The requested item does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },
}

/// Convenience alias used throughout the proctorchain crates.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The first rule a chain walk found broken.
///
/// Chain verification is fail-fast: only the earliest violation is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    /// A block's `index` does not match its position in the chain.
    #[error("block at position {position} carries index {index}")]
    IndexOutOfSequence { position: u64, index: u64 },

    /// Block 0 does not link to the genesis sentinel.
    #[error("genesis block does not link to the zero hash")]
    GenesisLink,

    /// `previous_hash` does not equal the recomputed hash of the predecessor.
    #[error("invalid previous hash at block {index}")]
    PreviousHashMismatch { index: u64 },

    /// The block hash lacks the required leading zeros.
    #[error("invalid proof-of-work at block {index}")]
    InsufficientWork { index: u64 },

    /// The stored Merkle root does not match the block's events.
    #[error("invalid Merkle root at block {index}")]
    MerkleRootMismatch { index: u64 },

    /// An exported block's recorded hash differs from its recomputed hash.
    #[error("recorded hash does not match contents at block {index}")]
    RecordedHashMismatch { index: u64 },

    /// The block could not be re-encoded for hashing.
    #[error("block {index} could not be hashed: {reason}")]
    Unhashable { index: u64, reason: String },
}
