//! SQLite Timing Store
//!
//! Stores one row per finished step in a `step_timings` table. The table is
//! created on open when missing and is never dropped.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use log::{debug, info, warn};
use rusqlite::{params, Connection};

use super::{InsertOutcome, NewTiming, TimingStore};
use crate::error::StoreError;
use crate::ledger::{StepId, StepRecord};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Timestamp layouts SQLite understands, `CURRENT_TIMESTAMP`'s first.
const SQLITE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS step_timings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    step_id TEXT UNIQUE,
    scenario_name TEXT,
    step_text TEXT,
    duration_ms INTEGER,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

/// SQLite-backed [`TimingStore`].
///
/// The connection lives behind a mutex, so concurrent step completions are
/// written one at a time.
///
/// # Example
///
/// ```rust,no_run
/// use stepledger::store::SqliteStore;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::open("step_timings.db")?;
///     // hand it to a ledger with TimingLedger::with_store(store)
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Timing database: {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Schema)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(StoreError::Schema)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::Schema)?;
        debug!("step_timings schema ready");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Returns true once [`TimingStore::close`] has succeeded.
    pub fn is_closed(&self) -> bool {
        self.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TimingStore for SqliteStore {
    fn insert(&self, timing: &NewTiming<'_>) -> Result<InsertOutcome, StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let changed = conn.execute(
            "INSERT OR IGNORE INTO step_timings (step_id, scenario_name, step_text, duration_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                timing.step_id.as_str(),
                timing.scenario_name,
                timing.step_text,
                i64::try_from(timing.duration_ms).unwrap_or(i64::MAX),
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    fn records(&self) -> Result<Vec<StepRecord>, StoreError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;

        let mut stmt = conn.prepare(
            "SELECT step_id, scenario_name, step_text, duration_ms, created_at
             FROM step_timings ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            let duration_ms: i64 = row.get(3)?;
            let created_at: Option<String> = row.get(4)?;

            Ok(StepRecord {
                step_id: StepId::from(row.get::<_, String>(0)?),
                scenario_name: row.get(1)?,
                step_text: row.get(2)?,
                started_at: None,
                duration: Duration::from_millis(u64::try_from(duration_ms).unwrap_or(0)),
                created_at: created_at.as_deref().and_then(parse_timestamp),
            })
        })?;

        // One unreadable row must not hide the rest of the table.
        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable step_timings row: {}", e),
            }
        }
        Ok(records)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let conn = guard.take().ok_or(StoreError::Closed)?;

        conn.close().map_err(|(_, e)| StoreError::Query(e))?;
        debug!("Timing database closed");
        Ok(())
    }
}

/// Parses a stored `created_at`. Zoned values are converted to UTC.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let parsed = SQLITE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        });

    if parsed.is_none() {
        warn!("Unrecognized created_at timestamp '{}'", raw);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn timing<'a>(id: &'a StepId, ms: u64) -> NewTiming<'a> {
        NewTiming {
            step_id: id,
            scenario_name: "LoginScenario",
            step_text: "I click submit",
            duration_ms: ms,
        }
    }

    #[test]
    fn test_open_creates_table() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("timings.db");

        let store = SqliteStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("no/such/dir/timings.db");

        let result = SqliteStore::open(&db_path);
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = StepId::from("LoginScenario-I click submit-1");

        let outcome = store.insert(&timing(&id, 153)).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].step_id, id);
        assert_eq!(records[0].scenario_name, "LoginScenario");
        assert_eq!(records[0].step_text, "I click submit");
        assert_eq!(records[0].duration_ms(), 153);
        assert!(records[0].created_at.is_some());
        assert!(records[0].started_at.is_none());
    }

    #[test]
    fn test_duplicate_insert_keeps_one_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = StepId::from("Dup-step-1");

        assert_eq!(store.insert(&timing(&id, 10)).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&timing(&id, 99)).unwrap(), InsertOutcome::Duplicate);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_ms(), 10);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("timings.db");
        let id = StepId::from("Persist-step-1");

        let store = SqliteStore::open(&db_path).unwrap();
        store.insert(&timing(&id, 5)).unwrap();
        store.close().unwrap();

        let reopened = SqliteStore::open(&db_path).unwrap();
        assert_eq!(reopened.records().unwrap().len(), 1);
    }

    #[test]
    fn test_close_twice_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(!store.is_closed());

        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_use_after_close_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.close().unwrap();

        let id = StepId::from("late");
        assert!(matches!(store.insert(&timing(&id, 1)), Err(StoreError::Closed)));
        assert!(matches!(store.records(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_concurrent_inserts() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(temp_dir.path().join("t.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..25 {
                        let id = StepId::from(format!("w{}-step-{}", worker, n));
                        store.insert(&timing(&id, n)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.records().unwrap().len(), 200);
    }

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-01-02 03:04:05").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_parse_timestamp_other_layouts() {
        let expected = parse_timestamp("2024-01-02 03:04:05").unwrap();

        assert_eq!(parse_timestamp("2024-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T05:04:05+02:00"), Some(expected));
        assert!(parse_timestamp("2024-01-02 03:04:05.250").is_some());
    }

    #[test]
    fn test_unreadable_row_is_skipped() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("timings.db");

        let store = SqliteStore::open(&db_path).unwrap();
        let good = StepId::from("Good-step-1");
        store.insert(&timing(&good, 7)).unwrap();

        let raw = Connection::open(&db_path).unwrap();
        raw.execute(
            "INSERT INTO step_timings (step_id, scenario_name, step_text, duration_ms)
             VALUES ('Broken-step-2', 'Broken', NULL, 3)",
            [],
        )
        .unwrap();
        raw.execute(
            "INSERT INTO step_timings (step_id, scenario_name, step_text, duration_ms, created_at)
             VALUES ('Iso-step-3', 'Iso', 'I use ISO time', 4, '2024-01-02T03:04:05Z')",
            [],
        )
        .unwrap();
        drop(raw);

        let records = store.records().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, vec!["Good-step-1", "Iso-step-3"]);
        assert!(records[1].created_at.is_some());
    }
}
