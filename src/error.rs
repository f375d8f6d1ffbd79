//! Error Types
//!
//! Failures that can cross a module boundary. Per-step timing problems never
//! show up here; they are routed to the ledger's diagnostics sink instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a durable timing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened.
    #[error("failed to open timing database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The schema could not be created or the connection configured.
    #[error("failed to prepare timing schema: {0}")]
    Schema(#[source] rusqlite::Error),

    /// A read or write against an open store failed.
    #[error("timing store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The store handle was already released.
    #[error("timing store is closed")]
    Closed,

    /// A thread panicked while holding the connection lock.
    #[error("timing store lock poisoned")]
    Poisoned,
}

/// Errors surfaced by [`crate::ledger::TimingLedger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while loading a scenario suite.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("failed to read suite file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse suite YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid suite: {0}")]
    Invalid(String),
}
