//! `SQLite`-backed [`BlockStore`].
//!
//! One connection guarded by a mutex; every block commit is one
//! transaction covering the block row and all of its event rows.  File
//! databases run in WAL mode so dashboard readers do not block the writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use proctorchain_contracts::{
    block::{Block, SealedBlock},
    error::{LedgerError, LedgerResult},
    event::{CheatingEvent, Severity},
    stats::EventCounts,
};
use proctorchain_core::BlockStore;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const EVENT_COLUMNS: &str = "event_id, timestamp, event_type, severity, description, \
     confidence_score, screenshot_path, metadata, session_id, user_id";

pub(crate) fn storage_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::Storage {
        reason: e.to_string(),
    }
}

/// The durable store of the ledger.
pub struct SqliteBlockStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBlockStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteBlockStore {
    /// Open or create the database at `path` and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| LedgerError::Storage {
            reason: format!("cannot open database '{}': {}", path.display(), e),
        })?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(storage_err)?;
        Self::initialize_connection(&conn)?;

        info!(path = %path.display(), journal_mode = %journal_mode, "ledger database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private in-memory database, for tests and dry runs.
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::initialize_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Location of the database file; `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize_connection(conn: &Connection) -> LedgerResult<()> {
        conn.execute_batch(SCHEMA_SQL).map_err(storage_err)?;
        Self::migrate_sealed_column(conn)
    }

    /// Add `blocks.sealed` to databases created before it existed.
    ///
    /// Rows that predate the column were all mined to full difficulty, so
    /// they default to sealed.
    fn migrate_sealed_column(conn: &Connection) -> LedgerResult<()> {
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(blocks)")
            .and_then(|mut stmt| {
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<Vec<_>, _>>();
                names
            })
            .map_err(storage_err)?;

        if !columns.iter().any(|c| c == "sealed") {
            conn.execute(
                "ALTER TABLE blocks ADD COLUMN sealed INTEGER NOT NULL DEFAULT 1",
                [],
            )
            .map_err(storage_err)?;
            debug!("added blocks.sealed column");
        }
        Ok(())
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LedgerError::LockPoisoned {
            reason: "sqlite connection".to_string(),
        })
    }

    fn query_events(
        &self,
        filter: &str,
        param: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM events {} ORDER BY timestamp DESC, rowid DESC LIMIT ?",
            EVENT_COLUMNS, filter
        );
        let limit = sql_limit(limit);

        let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
        let rows = match param {
            Some(value) => stmt
                .query_map(params![value, limit], EventRow::from_row)
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
            None => stmt
                .query_map(params![limit], EventRow::from_row)
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>()),
        }
        .map_err(storage_err)?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    fn grouped_counts(conn: &Connection, column: &str) -> LedgerResult<BTreeMap<String, u64>> {
        let sql = format!(
            "SELECT {col}, COUNT(*) FROM events GROUP BY {col}",
            col = column
        );
        let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
        let pairs = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, u64>(1)?))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(storage_err)?;

        Ok(pairs
            .into_iter()
            .map(|(key, count)| (key.unwrap_or_default(), count))
            .collect())
    }
}

impl BlockStore for SqliteBlockStore {
    fn load_chain(&self) -> LedgerResult<Vec<Block>> {
        let conn = self.lock()?;

        let mut headers = conn
            .prepare(
                "SELECT block_index, timestamp, previous_hash, merkle_root, nonce
                 FROM blocks ORDER BY block_index",
            )
            .and_then(|mut stmt| {
                let blocks = stmt.query_map([], |row| {
                    Ok(Block {
                        index: row.get(0)?,
                        timestamp: row.get(1)?,
                        events: Vec::new(),
                        previous_hash: row.get(2)?,
                        merkle_root: row.get(3)?,
                        nonce: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>();
                blocks
            })
            .map_err(storage_err)?;

        // Insertion order is the order the events were sealed in.
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM events WHERE block_index = ?1 ORDER BY rowid",
                EVENT_COLUMNS
            ))
            .map_err(storage_err)?;
        for block in &mut headers {
            let rows = stmt
                .query_map(params![block.index], EventRow::from_row)
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(storage_err)?;
            block.events = rows
                .into_iter()
                .map(EventRow::into_event)
                .collect::<LedgerResult<_>>()?;
        }

        Ok(headers)
    }

    fn commit_block(&self, sealed: &SealedBlock) -> LedgerResult<()> {
        let block = &sealed.block;
        let metadata = block
            .events
            .iter()
            .map(|event| {
                serde_json::to_string(&event.metadata).map_err(|e| LedgerError::Serialization {
                    reason: format!("metadata of event {}: {}", event.event_id, e),
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err)?;

        tx.execute(
            "INSERT INTO blocks (block_index, timestamp, previous_hash, merkle_root, nonce, hash, signature, sealed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                block.index,
                block.timestamp,
                block.previous_hash,
                block.merkle_root,
                block.nonce,
                sealed.hash,
                sealed.signature,
                sealed.seal.is_sealed(),
            ],
        )
        .map_err(storage_err)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO events (event_id, block_index, timestamp, event_type, severity,
                         description, confidence_score, screenshot_path, metadata, session_id, user_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .map_err(storage_err)?;

            for (event, metadata) in block.events.iter().zip(&metadata) {
                stmt.execute(params![
                    event.event_id,
                    block.index,
                    event.timestamp,
                    event.event_type,
                    event.severity.as_str(),
                    event.description,
                    event.confidence_score,
                    event.screenshot_path,
                    metadata,
                    event.session_id,
                    event.user_id,
                ])
                .map_err(storage_err)?;
            }
        }

        tx.commit().map_err(storage_err)?;
        debug!(
            block_index = block.index,
            events = block.events.len(),
            "block committed"
        );
        Ok(())
    }

    fn block_signature(&self, index: u64) -> LedgerResult<Option<String>> {
        let conn = self.lock()?;
        let signature: Option<Option<String>> = conn
            .query_row(
                "SELECT signature FROM blocks WHERE block_index = ?1",
                params![index],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        Ok(signature.flatten())
    }

    fn events_by_type(
        &self,
        event_type: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        match event_type {
            Some(t) => self.query_events("WHERE event_type = ?", Some(t), limit),
            None => self.query_events("", None, limit),
        }
    }

    fn events_by_severity(
        &self,
        severity: Severity,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        self.query_events("WHERE severity = ?", Some(severity.as_str()), limit)
    }

    fn events_by_session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> LedgerResult<Vec<CheatingEvent>> {
        self.query_events("WHERE session_id = ?", Some(session_id), limit)
    }

    fn event_counts(&self, since: f64) -> LedgerResult<EventCounts> {
        let conn = self.lock()?;

        let total: u64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .map_err(storage_err)?;
        let recent: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE timestamp > ?1",
                params![since],
                |row| row.get(0),
            )
            .map_err(storage_err)?;

        Ok(EventCounts {
            total,
            by_type: Self::grouped_counts(&conn, "event_type")?,
            by_severity: Self::grouped_counts(&conn, "severity")?,
            recent,
        })
    }

    fn unsealed_blocks(&self) -> LedgerResult<Vec<u64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT block_index FROM blocks WHERE sealed = 0 ORDER BY block_index")
            .map_err(storage_err)?;
        let indices = stmt
            .query_map([], |row| row.get::<_, u64>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(storage_err)?;
        Ok(indices)
    }

    fn screenshots_before(&self, cutoff: f64) -> LedgerResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT screenshot_path FROM events
                 WHERE timestamp < ?1 AND screenshot_path IS NOT NULL
                 ORDER BY timestamp",
            )
            .map_err(storage_err)?;
        let paths = stmt
            .query_map(params![cutoff], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(storage_err)?;
        Ok(paths)
    }
}

/// Row values before validation.  Severity and metadata are parsed outside
/// the rusqlite closure so their failures surface as ledger errors.
struct EventRow {
    event_id: String,
    timestamp: f64,
    event_type: String,
    severity: String,
    description: String,
    confidence_score: f64,
    screenshot_path: Option<String>,
    metadata: Option<String>,
    session_id: String,
    user_id: Option<String>,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            timestamp: row.get(1)?,
            event_type: row.get(2)?,
            severity: row.get(3)?,
            description: row.get(4)?,
            confidence_score: row.get(5)?,
            screenshot_path: row.get(6)?,
            metadata: row.get(7)?,
            session_id: row.get(8)?,
            user_id: row.get(9)?,
        })
    }

    fn into_event(self) -> LedgerResult<CheatingEvent> {
        let metadata = match self.metadata.as_deref() {
            None | Some("") => Map::new(),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(LedgerError::Serialization {
                        reason: format!("metadata of event {} is not an object", self.event_id),
                    })
                }
                Err(e) => {
                    return Err(LedgerError::Serialization {
                        reason: format!("metadata of event {}: {}", self.event_id, e),
                    })
                }
            },
        };

        Ok(CheatingEvent {
            severity: self.severity.parse()?,
            event_id: self.event_id,
            timestamp: self.timestamp,
            event_type: self.event_type,
            description: self.description,
            confidence_score: self.confidence_score,
            screenshot_path: self.screenshot_path,
            metadata,
            session_id: self.session_id,
            user_id: self.user_id,
        })
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use proctorchain_contracts::{Seal, GENESIS_PREVIOUS_HASH};
    use proctorchain_core::Miner;

    use super::*;

    fn event(id: &str, event_type: &str, severity: Severity, ts: f64) -> CheatingEvent {
        CheatingEvent::new(event_type, severity, format!("{} happened", event_type), 0.8)
            .with_event_id(id)
            .with_timestamp(ts)
            .with_session_id("session-a")
    }

    fn seal(events: Vec<CheatingEvent>, previous: Option<&Block>) -> SealedBlock {
        let mined = Miner::new(0, 1).mine(events, previous).unwrap();
        SealedBlock {
            block: mined.block,
            hash: mined.hash,
            signature: "c2lnbmF0dXJl".to_string(),
            seal: mined.seal,
        }
    }

    #[test]
    fn committed_chain_reloads_identically() {
        let store = SqliteBlockStore::in_memory().unwrap();

        let mut metadata = Map::new();
        metadata.insert("direction".to_string(), Value::from("left"));
        let first = seal(
            vec![
                event("e1", "head_misalignment", Severity::High, 100.0)
                    .with_metadata(metadata)
                    .with_screenshot("shots/e1.png"),
                event("e2", "mobile_detection", Severity::Critical, 101.0).with_user_id("u-7"),
            ],
            None,
        );
        let second = seal(
            vec![event("e3", "gaze_away", Severity::Low, 102.0)],
            Some(&first.block),
        );
        store.commit_block(&first).unwrap();
        store.commit_block(&second).unwrap();

        let chain = store.load_chain().unwrap();
        assert_eq!(chain, vec![first.block.clone(), second.block.clone()]);
        assert_eq!(chain[0].previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(
            store.block_signature(1).unwrap().as_deref(),
            Some("c2lnbmF0dXJl")
        );
        assert_eq!(store.block_signature(7).unwrap(), None);
    }

    /// Reload keeps sealed order even when event timestamps are not sorted.
    #[test]
    fn reload_preserves_sealed_order() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let sealed = seal(
            vec![
                event("late", "a", Severity::Low, 300.0),
                event("early", "b", Severity::Low, 100.0),
            ],
            None,
        );
        store.commit_block(&sealed).unwrap();

        let chain = store.load_chain().unwrap();
        let ids: Vec<_> = chain[0].events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, ["late", "early"]);
    }

    #[test]
    fn failed_commit_leaves_nothing_behind() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let first = seal(vec![event("dup", "a", Severity::Low, 1.0)], None);
        store.commit_block(&first).unwrap();

        // Second block reuses an event id; the insert fails part-way.
        let second = seal(
            vec![
                event("fresh", "a", Severity::Low, 2.0),
                event("dup", "a", Severity::Low, 3.0),
            ],
            Some(&first.block),
        );
        let err = store.commit_block(&second).unwrap_err();
        assert!(matches!(err, LedgerError::Storage { .. }));

        assert_eq!(store.load_chain().unwrap(), vec![first.block]);
        assert_eq!(store.event_counts(0.0).unwrap().total, 1);
        assert!(store.events_by_type(Some("a"), 10).unwrap().iter().all(|e| e.event_id == "dup"));
    }

    #[test]
    fn queries_are_most_recent_first_and_limited() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let sealed = seal(
            vec![
                event("e1", "gaze_away", Severity::Low, 10.0),
                event("e2", "mobile_detection", Severity::High, 30.0),
                event("e3", "gaze_away", Severity::High, 20.0),
                event("e4", "gaze_away", Severity::Low, 40.0).with_session_id("session-b"),
            ],
            None,
        );
        store.commit_block(&sealed).unwrap();

        let ids = |events: Vec<CheatingEvent>| -> Vec<String> {
            events.into_iter().map(|e| e.event_id).collect()
        };

        assert_eq!(
            ids(store.events_by_type(Some("gaze_away"), 100).unwrap()),
            ["e4", "e3", "e1"]
        );
        assert_eq!(ids(store.events_by_type(None, 2).unwrap()), ["e4", "e2"]);
        assert_eq!(
            ids(store.events_by_severity(Severity::High, 100).unwrap()),
            ["e2", "e3"]
        );
        assert_eq!(
            ids(store.events_by_session("session-a", 100).unwrap()),
            ["e2", "e3", "e1"]
        );
        assert!(store.events_by_type(Some("unknown"), 100).unwrap().is_empty());
    }

    #[test]
    fn counts_group_by_type_and_severity() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let sealed = seal(
            vec![
                event("e1", "gaze_away", Severity::Low, 10.0),
                event("e2", "gaze_away", Severity::High, 30.0),
                event("e3", "mobile_detection", Severity::High, 50.0),
            ],
            None,
        );
        store.commit_block(&sealed).unwrap();

        let counts = store.event_counts(20.0).unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.recent, 2);
        assert_eq!(counts.by_type.get("gaze_away"), Some(&2));
        assert_eq!(counts.by_type.get("mobile_detection"), Some(&1));
        assert_eq!(counts.by_severity.get("high"), Some(&2));
        assert_eq!(counts.by_severity.get("low"), Some(&1));
        assert_eq!(counts.by_severity.get("critical"), None);
    }

    #[test]
    fn unsealed_blocks_are_recorded() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let first = seal(vec![], None);
        let mut second = seal(vec![], Some(&first.block));
        second.seal = Seal::AttemptsExhausted;
        store.commit_block(&first).unwrap();
        store.commit_block(&second).unwrap();

        assert_eq!(store.unsealed_blocks().unwrap(), vec![1]);
    }

    #[test]
    fn screenshots_before_cutoff() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let sealed = seal(
            vec![
                event("old", "a", Severity::Low, 10.0).with_screenshot("old.png"),
                event("bare", "a", Severity::Low, 11.0),
                event("new", "a", Severity::Low, 50.0).with_screenshot("new.png"),
            ],
            None,
        );
        store.commit_block(&sealed).unwrap();

        assert_eq!(store.screenshots_before(20.0).unwrap(), ["old.png"]);
    }

    #[test]
    fn legacy_database_gains_sealed_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE blocks (block_index INTEGER PRIMARY KEY, timestamp REAL,
                     previous_hash TEXT, merkle_root TEXT, nonce INTEGER, hash TEXT UNIQUE,
                     signature TEXT);
                 INSERT INTO blocks VALUES (0, 1.5, 'p', 'm', 7, 'h', 's');",
            )
            .unwrap();
        }

        let store = SqliteBlockStore::open(&path).unwrap();
        assert!(store.unsealed_blocks().unwrap().is_empty());
        drop(store);

        // Reopening must not try to add the column twice.
        let store = SqliteBlockStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.load_chain().unwrap().len(), 1);
    }

    #[test]
    fn legacy_metadata_text_is_accepted() {
        let store = SqliteBlockStore::in_memory().unwrap();
        let sealed = seal(vec![event("e1", "a", Severity::Medium, 1.0)], None);
        store.commit_block(&sealed).unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "UPDATE events SET metadata = '{\"angle\": 12.5}' WHERE event_id = 'e1'",
                [],
            )
            .unwrap();
        }

        let events = store.events_by_type(None, 1).unwrap();
        assert_eq!(events[0].metadata.get("angle"), Some(&Value::from(12.5)));
    }
}
