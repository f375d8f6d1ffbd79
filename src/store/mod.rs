//! Durable Timing Storage
//!
//! Persists finished step timings so they survive the process.
//!
//! # Components
//!
//! - [`TimingStore`]: storage seam used by the ledger
//! - [`SqliteStore`]: single-file SQLite implementation

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::ledger::{StepId, StepRecord};

/// A finished timing ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTiming<'a> {
    pub step_id: &'a StepId,
    pub scenario_name: &'a str,
    pub step_text: &'a str,
    pub duration_ms: u64,
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same step id already existed; nothing was written.
    Duplicate,
}

/// Backing store for finished timings.
///
/// Implementations must serialize conflicting writes themselves; the ledger
/// calls them from many threads at once.
pub trait TimingStore: Send + Sync {
    /// Inserts a timing unless its step id is already present.
    fn insert(&self, timing: &NewTiming<'_>) -> Result<InsertOutcome, StoreError>;

    /// Reads every persisted timing.
    fn records(&self) -> Result<Vec<StepRecord>, StoreError>;

    /// Releases the underlying handle. Fails if already released.
    fn close(&self) -> Result<(), StoreError>;
}
