//! Export documents on disk.
//!
//! An exported chain is checked the same way the live chain is, plus one
//! extra rule: each block's recorded `hash` must equal the hash recomputed
//! from its contents.

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use proctorchain_contracts::{
    block::Block,
    error::{ChainViolation, LedgerError, LedgerResult},
    export::ChainExport,
};
use proctorchain_core::{block_hash, verify_chain};

/// Write `document` as pretty-printed JSON, creating parent directories.
pub fn write_document<T: Serialize>(path: &Path, document: &T) -> LedgerResult<()> {
    let json = serde_json::to_string_pretty(document).map_err(|e| LedgerError::Serialization {
        reason: format!("cannot encode export document: {}", e),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(path, json).map_err(|e| io_err(path, e))
}

/// Read a JSON document written by [`write_document`].
pub fn read_document<T: DeserializeOwned>(path: &Path) -> LedgerResult<T> {
    let json = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&json).map_err(|e| LedgerError::Serialization {
        reason: format!("'{}' is not a valid export document: {}", path.display(), e),
    })
}

pub fn read_chain_export(path: &Path) -> LedgerResult<ChainExport> {
    read_document(path)
}

/// Check an exported chain at `difficulty`.
///
/// Pass the difficulty the ledger is configured with rather than trusting
/// `export.metadata.difficulty`, which travels with the document.
pub fn verify_export(export: &ChainExport, difficulty: usize) -> Result<(), ChainViolation> {
    let blocks: Vec<Block> = export.blocks.iter().map(|b| b.to_block()).collect();
    verify_chain(&blocks, difficulty)?;

    for (exported, block) in export.blocks.iter().zip(&blocks) {
        let hash = block_hash(block).map_err(|e| ChainViolation::Unhashable {
            index: block.index,
            reason: e.to_string(),
        })?;
        if hash != exported.hash {
            return Err(ChainViolation::RecordedHashMismatch { index: block.index });
        }
    }
    Ok(())
}

fn io_err(path: &Path, e: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
