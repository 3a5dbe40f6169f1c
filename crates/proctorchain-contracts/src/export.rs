//! Self-describing export documents.
//!
//! `ChainExport` is the full-chain audit document; `SessionExport` is the
//! producer-side document covering one exam session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    block::Block,
    event::{CheatingEvent, Severity},
};

/// Header of a full-chain export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// When the document was written, in seconds since the Unix epoch.
    pub export_timestamp: f64,
    pub total_blocks: u64,
    pub total_events: u64,
    pub difficulty: usize,
}

/// One block as it appears in an export, including its recorded hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedBlock {
    pub index: u64,
    pub timestamp: f64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub nonce: u64,

    /// The block hash at export time.  Re-importers recompute and compare.
    pub hash: String,

    pub events: Vec<CheatingEvent>,
}

impl ExportedBlock {
    /// Attach a precomputed `hash` to `block`.
    pub fn from_block(block: &Block, hash: String) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            previous_hash: block.previous_hash.clone(),
            merkle_root: block.merkle_root.clone(),
            nonce: block.nonce,
            hash,
            events: block.events.clone(),
        }
    }

    /// Rebuild the chain block; the recorded hash is not part of it.
    pub fn to_block(&self) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            events: self.events.clone(),
            previous_hash: self.previous_hash.clone(),
            merkle_root: self.merkle_root.clone(),
            nonce: self.nonce,
        }
    }
}

/// The full-chain export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExport {
    pub metadata: ExportMetadata,
    pub blocks: Vec<ExportedBlock>,
}

/// An event as listed in a session export (session and user are implied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEventRecord {
    pub event_id: String,
    pub timestamp: f64,
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub confidence_score: f64,
    pub screenshot_path: Option<String>,
    pub metadata: Map<String, Value>,
}

impl From<CheatingEvent> for SessionEventRecord {
    fn from(event: CheatingEvent) -> Self {
        Self {
            event_id: event.event_id,
            timestamp: event.timestamp,
            event_type: event.event_type,
            severity: event.severity,
            description: event.description,
            confidence_score: event.confidence_score,
            screenshot_path: event.screenshot_path,
            metadata: event.metadata,
        }
    }
}

/// The session export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: String,
    pub export_timestamp: f64,
    pub total_events: u64,
    pub events: Vec<SessionEventRecord>,
}
