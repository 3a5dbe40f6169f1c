//! Block and event hashing.
//!
//! Every digest is the lowercase hex SHA-256 of a canonical encoding (see
//! [`crate::canonical`]).  The block hash covers exactly the six serialized
//! `Block` fields; the signature is never part of it.

use serde::Serialize;
use sha2::{Digest, Sha256};

use proctorchain_contracts::{
    block::Block, error::LedgerResult, event::CheatingEvent,
};

use crate::canonical::to_canonical_string;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Hash of a single event: the Merkle leaf.
pub fn event_hash(event: &CheatingEvent) -> LedgerResult<String> {
    Ok(sha256_hex(to_canonical_string(event)?))
}

/// Hash of a block, recomputed from all of its fields.
pub fn block_hash(block: &Block) -> LedgerResult<String> {
    Ok(sha256_hex(to_canonical_string(block)?))
}

/// The header fields a block signature covers.
#[derive(Serialize)]
struct SignedHeader<'a> {
    index: u64,
    timestamp: f64,
    merkle_root: &'a str,
    previous_hash: &'a str,
    nonce: u64,
}

/// Canonical bytes a block signature is computed over.
///
/// Events are committed through `merkle_root`, so they are not repeated here.
pub fn signing_payload(block: &Block) -> LedgerResult<String> {
    to_canonical_string(&SignedHeader {
        index: block.index,
        timestamp: block.timestamp,
        merkle_root: &block.merkle_root,
        previous_hash: &block.previous_hash,
        nonce: block.nonce,
    })
}

/// True if `hash` starts with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Digest-level form of [`meets_difficulty`]: counts leading zero nibbles.
pub(crate) fn digest_meets_difficulty(digest: &[u8], difficulty: usize) -> bool {
    (0..difficulty).all(|i| match digest.get(i / 2) {
        Some(byte) if i % 2 == 0 => byte >> 4 == 0,
        Some(byte) => byte & 0x0f == 0,
        None => false,
    })
}
