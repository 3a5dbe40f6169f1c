//! A dedicated mining thread.
//!
//! `Ledger::log_event` mines on the caller's thread when a batch fills.
//! Detector loops that must not stall for a nonce search submit through a
//! `LedgerWorker` instead: submissions go over a channel to one thread that
//! owns all calls into the ledger, so commit atomicity is unchanged.
//!
//! ```text
//!   producers ──submit──▶ mpsc channel ──▶ worker thread ──▶ Ledger
//! ```

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use proctorchain_contracts::{
    block::BlockReceipt,
    error::{LedgerError, LedgerResult},
    event::CheatingEvent,
};

use crate::ledger::{Ledger, LogOutcome};

/// Message sent to the worker thread.
enum WorkerMessage {
    /// Queue an event; failures are logged on the worker.
    Submit(CheatingEvent),

    /// Mine whatever is pending and report back.
    Flush {
        response: Sender<LedgerResult<Option<BlockReceipt>>>,
    },

    /// Flush, then stop.
    Shutdown,
}

/// Handle to the mining thread.  Dropping it shuts the thread down.
pub struct LedgerWorker {
    sender: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl LedgerWorker {
    /// Start the worker thread for `ledger`.
    pub fn spawn(ledger: Arc<Ledger>) -> LedgerResult<Self> {
        let (sender, mailbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("proctorchain-miner".to_string())
            .spawn(move || run(ledger, mailbox))
            .map_err(|e| LedgerError::Io {
                path: "proctorchain-miner".to_string(),
                reason: format!("cannot spawn worker thread: {}", e),
            })?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Hand `event` to the worker without waiting for it to be mined.
    pub fn submit(&self, event: CheatingEvent) -> LedgerResult<()> {
        self.sender
            .send(WorkerMessage::Submit(event))
            .map_err(|_| stopped())
    }

    /// Wait until every earlier submission is processed, then mine the rest.
    pub fn flush(&self) -> LedgerResult<Option<BlockReceipt>> {
        let (response, reply) = mpsc::channel();
        self.sender
            .send(WorkerMessage::Flush { response })
            .map_err(|_| stopped())?;
        reply.recv().map_err(|_| stopped())?
    }

    /// Process everything submitted so far, flush, and join the thread.
    pub fn shutdown(mut self) -> LedgerResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> LedgerResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // A send error means the thread already exited; join reports why.
        let _ = self.sender.send(WorkerMessage::Shutdown);
        handle.join().map_err(|_| LedgerError::LockPoisoned {
            reason: "mining worker panicked".to_string(),
        })
    }
}

impl Drop for LedgerWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "mining worker did not stop cleanly");
        }
    }
}

fn run(ledger: Arc<Ledger>, mailbox: Receiver<WorkerMessage>) {
    debug!("mining worker started");

    // The loop also ends when every handle is gone.
    while let Ok(message) = mailbox.recv() {
        match message {
            WorkerMessage::Submit(event) => match ledger.try_log_event(event) {
                Ok(LogOutcome::Mined(receipt)) => {
                    debug!(block_index = receipt.index, "worker mined block");
                }
                Ok(LogOutcome::Queued { .. }) => {}
                Err(e) => error!(error = %e, "worker failed to log event"),
            },
            WorkerMessage::Flush { response } => {
                // The requester may have given up waiting.
                let _ = response.send(ledger.flush_pending());
            }
            WorkerMessage::Shutdown => break,
        }
    }

    match ledger.flush_pending() {
        Ok(Some(receipt)) => info!(block_index = receipt.index, "worker flushed on shutdown"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "worker could not flush on shutdown"),
    }
    debug!("mining worker stopped");
}

fn stopped() -> LedgerError {
    LedgerError::NotFound {
        what: "mining worker (already stopped)".to_string(),
    }
}
