//! The ledger facade.
//!
//! Producers call [`Ledger::log_event`]; consumers query, verify, export
//! and clean up.  Internally every accepted event flows through
//!
//!   pending queue → (batch full | flush) → Merkle root + nonce search
//!   → signature → store commit → in-memory chain append → queue cleared
//!
//! The pending-queue mutex is held across that whole pipeline, so at most
//! one block is mined at a time and a block is never appended unless its
//! commit succeeded.  The in-memory chain has its own `RwLock`, write-locked
//! only for the append; readers never wait on the nonce search.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use proctorchain_contracts::{
    block::{Block, BlockReceipt, SealedBlock},
    error::{ChainViolation, LedgerError, LedgerResult},
    event::{unix_now, CheatingEvent, Severity},
    export::{ChainExport, ExportMetadata, ExportedBlock},
    stats::{CleanupReport, LedgerStatistics, MiningMetrics},
};
use proctorchain_core::{block_hash, verify_chain, BlockSigner, BlockStore, Miner};
use proctorchain_crypto::{KeyPair, RsaPssSigner};
use proctorchain_store::SqliteBlockStore;

use crate::config::{LedgerConfig, LedgerSettings};
use crate::export::write_document;

/// The window `get_statistics` counts as recent.
const RECENT_WINDOW_SECS: f64 = 24.0 * 60.0 * 60.0;

const SECS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// What happened to an event handed to [`Ledger::try_log_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    /// Waiting for the batch to fill; `pending` events are now queued.
    Queued { pending: usize },

    /// The event completed a batch and was sealed into a block.
    Mined(BlockReceipt),
}

/// The tamper-evident event ledger.
///
/// Share one instance as `Arc<Ledger>`; every method takes `&self`.
pub struct Ledger {
    settings: LedgerSettings,
    miner: Miner,
    store: Box<dyn BlockStore>,
    signer: Box<dyn BlockSigner>,
    pending: Mutex<Vec<CheatingEvent>>,
    pending_len: AtomicUsize,
    chain: RwLock<Vec<Block>>,
    metrics: Mutex<MiningMetrics>,
}

impl Ledger {
    /// Build a ledger over injected collaborators and load its chain.
    ///
    /// A chain that cannot be loaded is fatal.  A chain that loads but fails
    /// verification is kept and reported, so it can still be inspected.
    pub fn new(
        settings: LedgerSettings,
        store: Box<dyn BlockStore>,
        signer: Box<dyn BlockSigner>,
    ) -> LedgerResult<Self> {
        let chain = store.load_chain()?;
        let miner = Miner::new(settings.difficulty, settings.max_mining_attempts);

        match verify_chain(&chain, miner.difficulty()) {
            Ok(()) => info!(
                blocks = chain.len(),
                difficulty = miner.difficulty(),
                batch_size = settings.batch_size,
                "ledger chain loaded"
            ),
            Err(violation) => warn!(
                blocks = chain.len(),
                violation = %violation,
                "ledger chain loaded but does not verify"
            ),
        }

        Ok(Self {
            settings,
            miner,
            store,
            signer,
            pending: Mutex::new(Vec::with_capacity(settings.batch_size)),
            pending_len: AtomicUsize::new(0),
            chain: RwLock::new(chain),
            metrics: Mutex::new(MiningMetrics::default()),
        })
    }

    /// Open the SQLite database and signing keys named by `config`.
    ///
    /// Keys are generated and written on first start.
    pub fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let store = SqliteBlockStore::open(&config.database_path)?;
        let keypair = KeyPair::load_or_generate(&config.private_key_path, &config.public_key_path)?;
        let signer = RsaPssSigner::new(&keypair);
        Self::new(config.settings(), Box::new(store), Box::new(signer))
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    pub fn difficulty(&self) -> usize {
        self.miner.difficulty()
    }

    // ── Producer side ────────────────────────────────────────────────────────

    /// Queue `event`, mining a block when the batch is full.
    ///
    /// On error the queue and the event counter are as they were before the
    /// call.
    pub fn try_log_event(&self, event: CheatingEvent) -> LedgerResult<LogOutcome> {
        check_finite(&event)?;
        let mut pending = self.lock_pending()?;

        let event_id = event.event_id.clone();
        let event_type = event.event_type.clone();
        // Take the metrics lock first so a poisoned lock leaves the queue alone.
        let mut metrics = self.lock_metrics()?;
        pending.push(event);
        metrics.total_events += 1;
        drop(metrics);

        if pending.len() < self.settings.batch_size {
            self.pending_len.store(pending.len(), Ordering::Release);
            debug!(
                event_id = %event_id,
                event_type = %event_type,
                pending = pending.len(),
                "event queued"
            );
            return Ok(LogOutcome::Queued {
                pending: pending.len(),
            });
        }

        match self.mine_pending(&mut pending) {
            Ok(Some(receipt)) => Ok(LogOutcome::Mined(receipt)),
            Ok(None) => Ok(LogOutcome::Queued { pending: 0 }),
            Err(e) => {
                pending.pop();
                self.pending_len.store(pending.len(), Ordering::Release);
                if let Ok(mut metrics) = self.metrics.lock() {
                    metrics.total_events = metrics.total_events.saturating_sub(1);
                }
                Err(e)
            }
        }
    }

    /// Boolean form of [`try_log_event`](Self::try_log_event).
    ///
    /// Failures are logged and reported as `false`; this never panics.
    pub fn log_event(&self, event: CheatingEvent) -> bool {
        let event_type = event.event_type.clone();
        match self.try_log_event(event) {
            Ok(_) => true,
            Err(e) => {
                error!(event_type = %event_type, error = %e, "failed to log event");
                false
            }
        }
    }

    /// Mine whatever is pending, regardless of batch size.
    ///
    /// Returns `None` when the queue is empty.  On error the queue is kept.
    pub fn flush_pending(&self) -> LedgerResult<Option<BlockReceipt>> {
        let mut pending = self.lock_pending()?;
        self.mine_pending(&mut pending)
    }

    /// Seal `pending` into the next block.  The caller holds the queue lock.
    fn mine_pending(&self, pending: &mut Vec<CheatingEvent>) -> LedgerResult<Option<BlockReceipt>> {
        if pending.is_empty() {
            return Ok(None);
        }
        let started = Instant::now();

        let previous = self.read_chain()?.last().cloned();
        let mined = self.miner.mine(pending.clone(), previous.as_ref())?;
        let signature = self.signer.sign(&mined.block)?;

        let sealed = SealedBlock {
            block: mined.block,
            hash: mined.hash,
            signature,
            seal: mined.seal,
        };
        self.store.commit_block(&sealed)?;

        let receipt = BlockReceipt {
            index: sealed.block.index,
            hash: sealed.hash.clone(),
            event_count: sealed.block.events.len(),
            nonce: sealed.block.nonce,
            seal: sealed.seal,
            mining_time: started.elapsed().as_secs_f64(),
        };

        self.chain
            .write()
            .map_err(|_| poisoned("chain"))?
            .push(sealed.block);
        pending.clear();
        self.pending_len.store(0, Ordering::Release);
        self.lock_metrics()?.record_block(receipt.mining_time);

        info!(
            block_index = receipt.index,
            hash = %receipt.hash,
            nonce = receipt.nonce,
            attempts = mined.attempts,
            events = receipt.event_count,
            elapsed_ms = (receipt.mining_time * 1000.0) as u64,
            sealed = receipt.seal.is_sealed(),
            "block mined"
        );
        Ok(Some(receipt))
    }

    // ── Consumer side ────────────────────────────────────────────────────────

    /// Committed events of `event_type`, newest first; `"all"` matches any.
    pub fn get_events_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        let filter = (event_type != "all").then_some(event_type);
        self.store.events_by_type(filter, limit)
    }

    pub fn get_events_by_severity(
        &self,
        severity: Severity,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        self.store.events_by_severity(severity, limit)
    }

    pub fn get_events_by_session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        self.store.events_by_session(session_id, limit)
    }

    pub fn get_block(&self, index: u64) -> LedgerResult<Option<Block>> {
        let chain = self.read_chain()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| chain.get(i))
            .cloned())
    }

    /// A snapshot of the whole chain.
    pub fn blocks(&self) -> LedgerResult<Vec<Block>> {
        Ok(self.read_chain()?.clone())
    }

    pub fn chain_length(&self) -> LedgerResult<usize> {
        Ok(self.read_chain()?.len())
    }

    /// Events queued for the next block.
    pub fn pending_count(&self) -> usize {
        self.pending_len.load(Ordering::Acquire)
    }

    /// Hash of the newest block, if any.
    pub fn latest_hash(&self) -> LedgerResult<Option<String>> {
        match self.read_chain()?.last() {
            Some(block) => Ok(Some(block_hash(block)?)),
            None => Ok(None),
        }
    }

    pub fn metrics(&self) -> LedgerResult<MiningMetrics> {
        Ok(self.lock_metrics()?.clone())
    }

    pub fn get_statistics(&self) -> LedgerResult<LedgerStatistics> {
        let counts = self.store.event_counts(unix_now() - RECENT_WINDOW_SECS)?;
        let unsealed_blocks = self.store.unsealed_blocks()?;
        let (total_blocks, chain_verified) = {
            let chain = self.read_chain()?;
            (chain.len() as u64, verify_chain(&chain, self.difficulty()).is_ok())
        };

        Ok(LedgerStatistics {
            total_events: counts.total,
            total_blocks,
            pending_events: self.pending_count() as u64,
            events_by_type: counts.by_type,
            events_by_severity: counts.by_severity,
            recent_events_24h: counts.recent,
            unsealed_blocks,
            difficulty: self.difficulty(),
            metrics: self.metrics()?,
            chain_verified,
        })
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// Walk the in-memory chain and report the first violation.
    pub fn check_chain(&self) -> LedgerResult<Result<(), ChainViolation>> {
        let chain = self.read_chain()?;
        Ok(verify_chain(&chain, self.difficulty()))
    }

    /// `true` when every block links, carries proof-of-work, and matches its
    /// Merkle root.
    pub fn verify_chain(&self) -> bool {
        match self.check_chain() {
            Ok(Ok(())) => true,
            Ok(Err(violation)) => {
                error!(violation = %violation, "chain verification failed");
                false
            }
            Err(e) => {
                error!(error = %e, "chain verification could not run");
                false
            }
        }
    }

    /// Check every stored block signature against the block it covers.
    ///
    /// `Ok(false)` when a signature is missing or does not match.
    pub fn verify_signatures(&self) -> LedgerResult<bool> {
        let chain = self.read_chain()?;
        for block in chain.iter() {
            let Some(signature) = self.store.block_signature(block.index)? else {
                warn!(block_index = block.index, "block has no stored signature");
                return Ok(false);
            };
            if !self.signer.verify(block, &signature)? {
                warn!(block_index = block.index, "block signature does not verify");
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ── Export and maintenance ───────────────────────────────────────────────

    /// Build the audit document for the current chain.
    pub fn chain_export(&self) -> LedgerResult<ChainExport> {
        let chain = self.read_chain()?;
        let blocks = chain
            .iter()
            .map(|block| Ok(ExportedBlock::from_block(block, block_hash(block)?)))
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(ChainExport {
            metadata: ExportMetadata {
                export_timestamp: unix_now(),
                total_blocks: blocks.len() as u64,
                total_events: blocks.iter().map(|b| b.events.len() as u64).sum(),
                difficulty: self.difficulty(),
            },
            blocks,
        })
    }

    /// Write the audit document to `path` as pretty-printed JSON.
    pub fn export_chain(&self, path: &Path) -> LedgerResult<ExportMetadata> {
        let export = self.chain_export()?;
        write_document(path, &export)?;
        info!(
            path = %path.display(),
            blocks = export.metadata.total_blocks,
            events = export.metadata.total_events,
            "chain exported"
        );
        Ok(export.metadata)
    }

    /// Delete screenshot files of events older than `max_age_days`.
    ///
    /// Event rows are never touched; only the files they point at.
    pub fn cleanup_old_screenshots(&self, max_age_days: u32) -> LedgerResult<CleanupReport> {
        let cutoff = unix_now() - f64::from(max_age_days) * SECS_PER_DAY;
        let paths = self.store.screenshots_before(cutoff)?;

        let mut report = CleanupReport {
            examined: paths.len(),
            ..CleanupReport::default()
        };
        for path in &paths {
            let path = Path::new(path);
            if !path.exists() {
                report.missing += 1;
                continue;
            }
            match std::fs::remove_file(path) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove screenshot");
                    report.failed += 1;
                }
            }
        }

        info!(
            max_age_days,
            examined = report.examined,
            removed = report.removed,
            failed = report.failed,
            "screenshot cleanup finished"
        );
        Ok(report)
    }

    // ── Locks ────────────────────────────────────────────────────────────────

    fn lock_pending(&self) -> LedgerResult<MutexGuard<'_, Vec<CheatingEvent>>> {
        self.pending.lock().map_err(|_| poisoned("pending queue"))
    }

    fn lock_metrics(&self) -> LedgerResult<MutexGuard<'_, MiningMetrics>> {
        self.metrics.lock().map_err(|_| poisoned("mining metrics"))
    }

    fn read_chain(&self) -> LedgerResult<RwLockReadGuard<'_, Vec<Block>>> {
        self.chain.read().map_err(|_| poisoned("chain"))
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("settings", &self.settings)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

fn poisoned(what: &str) -> LedgerError {
    LedgerError::LockPoisoned {
        reason: what.to_string(),
    }
}

/// NaN and infinities hash as `null` but cannot be stored or re-imported.
fn check_finite(event: &CheatingEvent) -> LedgerResult<()> {
    for (field, value) in [
        ("timestamp", event.timestamp),
        ("confidence_score", event.confidence_score),
    ] {
        if !value.is_finite() {
            return Err(LedgerError::Serialization {
                reason: format!("event {} has non-finite {}: {}", event.event_id, field, value),
            });
        }
    }
    Ok(())
}
