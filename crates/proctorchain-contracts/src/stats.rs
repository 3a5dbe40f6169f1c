//! Statistics and maintenance reports returned by the ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cumulative mining counters, counted from ledger construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningMetrics {
    /// Events accepted by `log_event`.
    pub total_events: u64,

    /// Blocks mined by this process.
    pub total_blocks: u64,

    /// Seconds spent on the most recent block.
    pub last_mining_time: f64,

    /// Running mean of all mining times, in seconds.
    pub average_mining_time: f64,
}

impl MiningMetrics {
    /// Record one mined block, updating the running mean incrementally.
    pub fn record_block(&mut self, mining_time: f64) {
        self.total_blocks += 1;
        self.last_mining_time = mining_time;
        let n = self.total_blocks as f64;
        self.average_mining_time += (mining_time - self.average_mining_time) / n;
    }
}

/// Aggregate counts the durable store computes over committed events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCounts {
    pub total: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,

    /// Events with a timestamp after the `since` cutoff of the query.
    pub recent: u64,
}

/// Everything the dashboard shows about the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    /// Committed events in the store.
    pub total_events: u64,

    /// Blocks in the in-memory chain.
    pub total_blocks: u64,

    /// Events waiting for the next block.
    pub pending_events: u64,

    pub events_by_type: BTreeMap<String, u64>,
    pub events_by_severity: BTreeMap<String, u64>,
    pub recent_events_24h: u64,

    /// Indices of blocks accepted after the attempt budget ran out.
    pub unsealed_blocks: Vec<u64>,

    pub difficulty: usize,
    pub metrics: MiningMetrics,

    /// Result of a full chain walk at the time of the call.
    pub chain_verified: bool,
}

/// Statistics for a single exam session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub session_id: String,
    pub total_session_events: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub events_by_severity: BTreeMap<String, u64>,
    pub session_start_time: Option<f64>,
    pub session_end_time: Option<f64>,
}

/// Outcome of a screenshot cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Screenshot paths referenced by events older than the cutoff.
    pub examined: usize,

    /// Files deleted.
    pub removed: usize,

    /// Paths that no longer existed.
    pub missing: usize,

    /// Files that existed but could not be deleted.
    pub failed: usize,
}
