//! # proctorchain-ledger
//!
//! The facade over the proctorchain event ledger.
//!
//! - [`Ledger`]: batching, mining, signing, persistence, queries,
//!   verification, export, and screenshot cleanup
//! - [`LedgerConfig`]: TOML configuration with defaults
//! - [`LedgerWorker`]: optional dedicated mining thread
//! - [`export`]: reading and checking exported chain documents
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use proctorchain_ledger::{Ledger, LedgerConfig};
//!
//! let ledger = Arc::new(Ledger::open(&LedgerConfig::default())?);
//! ledger.log_event(event);
//! ledger.flush_pending()?;
//! assert!(ledger.verify_chain());
//! ```

pub mod config;
pub mod export;
pub mod ledger;
pub mod worker;

pub use config::{LedgerConfig, LedgerSettings, DEFAULT_BATCH_SIZE};
pub use export::{read_chain_export, verify_export};
pub use ledger::{Ledger, LogOutcome};
pub use worker::LedgerWorker;
