//! # proctorchain-contracts
//!
//! Shared types for the proctorchain event ledger.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod block;
pub mod error;
pub mod event;
pub mod export;
pub mod stats;

pub use block::{Block, BlockReceipt, Seal, SealedBlock, GENESIS_PREVIOUS_HASH};
pub use error::{ChainViolation, LedgerError, LedgerResult};
pub use event::{unix_now, CheatingEvent, Severity};
