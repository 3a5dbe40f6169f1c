//! Block assembly and bounded proof-of-work search.
//!
//! The work here is a tamper deterrent for a single operator, not consensus:
//! rewriting an old event means re-mining every block after it.
//!
//! The search never re-serializes the whole block.  The canonical encoding
//! of a block is
//!
//!   `{"events": …, "index": …, "merkle_root": …, "nonce": N, "previous_hash": …, "timestamp": …}`
//!
//! so everything before `N` is hashed once into a prefix state that each
//! attempt clones, then extends with the nonce and the fixed suffix.  The
//! result is byte-for-byte the input [`block_hash`] would hash.

use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use proctorchain_contracts::{
    block::{Block, Seal, GENESIS_PREVIOUS_HASH},
    error::LedgerResult,
    event::{unix_now, CheatingEvent},
};

use crate::{
    canonical::{encode_str, format_float, to_canonical_string},
    hash::{block_hash, digest_meets_difficulty},
    merkle::merkle_root,
};

/// Leading `'0'` hex characters a block hash needs by default.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Nonces tried before the search gives up on a block.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000;

/// A block hash is 64 hex characters; no difficulty beyond that is satisfiable.
pub const MAX_DIFFICULTY: usize = 64;

/// The outcome of mining one batch.
#[derive(Debug, Clone)]
pub struct MinedBlock {
    pub block: Block,

    /// Hash of `block` with its final nonce.
    pub hash: String,

    pub seal: Seal,

    /// Nonces hashed, including the final one.
    pub attempts: u64,

    /// Time spent in the nonce search.
    pub elapsed: Duration,
}

/// Builds blocks and searches for a qualifying nonce.
#[derive(Debug, Clone)]
pub struct Miner {
    difficulty: usize,
    max_attempts: u64,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY, DEFAULT_MAX_ATTEMPTS)
    }
}

impl Miner {
    /// `difficulty` is capped at [`MAX_DIFFICULTY`]; at least one attempt is
    /// always made.
    pub fn new(difficulty: usize, max_attempts: u64) -> Self {
        Self {
            difficulty: difficulty.min(MAX_DIFFICULTY),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    /// The hash prefix a sealed block must start with.
    pub fn target(&self) -> String {
        "0".repeat(self.difficulty)
    }

    /// Assemble an unmined block (nonce 0) chained to `previous`.
    ///
    /// The new block's index is one past `previous`, or 0 for genesis.
    pub fn build_block(
        &self,
        events: Vec<CheatingEvent>,
        previous: Option<&Block>,
    ) -> LedgerResult<Block> {
        let merkle_root = merkle_root(&events)?;
        let (index, previous_hash) = match previous {
            Some(prev) => (prev.index + 1, block_hash(prev)?),
            None => (0, GENESIS_PREVIOUS_HASH.to_string()),
        };

        Ok(Block {
            index,
            timestamp: unix_now(),
            events,
            previous_hash,
            merkle_root,
            nonce: 0,
        })
    }

    /// Build a block over `events` and run the nonce search on it.
    pub fn mine(
        &self,
        events: Vec<CheatingEvent>,
        previous: Option<&Block>,
    ) -> LedgerResult<MinedBlock> {
        let block = self.build_block(events, previous)?;
        self.seal(block)
    }

    /// Search nonces `0..max_attempts` for a hash meeting the difficulty.
    ///
    /// When the budget runs out the block keeps the last nonce tried and is
    /// returned with [`Seal::AttemptsExhausted`].
    pub fn seal(&self, mut block: Block) -> LedgerResult<MinedBlock> {
        let started = Instant::now();

        let prefix = format!(
            "{{\"events\": {}, \"index\": {}, \"merkle_root\": {}, \"nonce\": ",
            to_canonical_string(&block.events)?,
            block.index,
            encode_str(&block.merkle_root),
        );
        let suffix = format!(
            ", \"previous_hash\": {}, \"timestamp\": {}}}",
            encode_str(&block.previous_hash),
            format_float(block.timestamp),
        );
        let base = Sha256::new_with_prefix(prefix.as_bytes());

        let mut nonce = 0u64;
        let mut digest = Default::default();
        let mut seal = Seal::AttemptsExhausted;
        while nonce < self.max_attempts {
            let mut hasher = base.clone();
            hasher.update(nonce.to_string().as_bytes());
            hasher.update(suffix.as_bytes());
            digest = hasher.finalize();

            if digest_meets_difficulty(&digest, self.difficulty) {
                seal = Seal::ProofOfWork;
                break;
            }
            if nonce + 1 == self.max_attempts {
                break;
            }
            nonce += 1;
        }

        block.nonce = nonce;
        let hash = hex::encode(digest);
        let attempts = nonce + 1;
        let elapsed = started.elapsed();

        match seal {
            Seal::ProofOfWork => debug!(
                block_index = block.index,
                nonce,
                hash = %hash,
                elapsed_ms = elapsed.as_millis() as u64,
                "proof-of-work found"
            ),
            Seal::AttemptsExhausted => warn!(
                block_index = block.index,
                attempts,
                difficulty = self.difficulty,
                hash = %hash,
                "mining attempt budget exhausted; accepting block without proof-of-work"
            ),
        }

        Ok(MinedBlock {
            block,
            hash,
            seal,
            attempts,
            elapsed,
        })
    }
}
