//! # proctorchain-store
//!
//! Durable storage for the proctorchain event ledger.
//!
//! [`SqliteBlockStore`] implements `proctorchain_core::BlockStore` over two
//! tables: `blocks` (one row per sealed block, with its hash and signature)
//! and `events` (one row per event, keyed by `event_id`, pointing at its
//! block).  Commits are transactional: a block and its events become
//! visible together or not at all.

mod sqlite;

pub use sqlite::SqliteBlockStore;
