//! Merkle aggregation of an event batch into one digest.
//!
//! Leaves are [`event_hash`] values.  Each level pairs adjacent hashes; an odd
//! level duplicates its last hash.  A parent is the SHA-256 of the two child
//! hashes concatenated as hex strings (not as raw bytes), which is what
//! persisted chains were built with.

use proctorchain_contracts::{error::LedgerResult, event::CheatingEvent};

use crate::hash::{event_hash, sha256_hex};

/// Root of an empty batch: the hash of the string `"empty"`.
pub fn empty_root() -> String {
    sha256_hex("empty")
}

/// Merkle root over `events`, in order.
pub fn merkle_root(events: &[CheatingEvent]) -> LedgerResult<String> {
    if events.is_empty() {
        return Ok(empty_root());
    }

    let leaves = events
        .iter()
        .map(event_hash)
        .collect::<LedgerResult<Vec<_>>>()?;

    Ok(reduce(leaves))
}

/// Pairwise reduction of a non-empty list of hex hashes.
fn reduce(mut level: Vec<String>) -> String {
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1])))
            .collect();
    }
    level.pop().unwrap_or_else(empty_root)
}
