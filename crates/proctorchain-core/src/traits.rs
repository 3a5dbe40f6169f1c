//! Trait seams between the ledger and its trusted collaborators.
//!
//! - `BlockStore`: durable, transactional persistence of blocks and events
//! - `BlockSigner`: authorship signatures over finalized blocks
//!
//! The ledger facade owns one of each behind a `Box<dyn _>`, so tests and
//! alternative deployments can substitute their own.

use proctorchain_contracts::{
    block::{Block, SealedBlock},
    error::LedgerResult,
    event::{CheatingEvent, Severity},
    stats::EventCounts,
};

/// Durable storage for the chain.
///
/// Query methods return events most-recent-first (by event timestamp) and
/// read only committed data; they never see the pending queue.
pub trait BlockStore: Send + Sync {
    /// Every committed block in index order, each with its events in the
    /// order they were sealed.
    fn load_chain(&self) -> LedgerResult<Vec<Block>>;

    /// Persist one block and all of its events atomically.
    ///
    /// On error nothing from this block is visible to later reads.
    fn commit_block(&self, sealed: &SealedBlock) -> LedgerResult<()>;

    /// The stored signature of block `index`, if that block exists.
    fn block_signature(&self, index: u64) -> LedgerResult<Option<String>>;

    /// Up to `limit` events of `event_type`, or of any type when `None`.
    fn events_by_type(
        &self,
        event_type: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>>;

    /// Up to `limit` events with the given severity.
    fn events_by_severity(
        &self,
        severity: Severity,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>>;

    /// Up to `limit` events recorded for one exam session.
    fn events_by_session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>>;

    /// Totals by type and severity, plus the count newer than `since`.
    fn event_counts(&self, since: f64) -> LedgerResult<EventCounts>;

    /// Indices of blocks committed without proof-of-work.
    fn unsealed_blocks(&self) -> LedgerResult<Vec<u64>>;

    /// Screenshot paths of events captured before `cutoff`.
    fn screenshots_before(&self, cutoff: f64) -> LedgerResult<Vec<String>>;
}

/// Signs finalized blocks and checks those signatures.
pub trait BlockSigner: Send + Sync {
    /// Sign the block header; returns the signature as base64.
    fn sign(&self, block: &Block) -> LedgerResult<String>;

    /// Check a base64 signature against the block header.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match,
    /// and `Err` only when the signature cannot be decoded at all.
    fn verify(&self, block: &Block, signature: &str) -> LedgerResult<bool>;
}
