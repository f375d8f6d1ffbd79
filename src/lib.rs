//! StepLedger - Step Timing for Behavior-Driven Test Runs
//!
//! Records how long every step of every scenario takes, keeps the timings
//! in a concurrent in-memory ledger and optionally persists them to SQLite.
//!
//! # Architecture
//!
//! - [`ledger`]: The concurrent timing ledger and its report
//! - [`store`]: Durable storage for finished timings
//! - [`hooks`]: Glue between the ledger and runner lifecycle callbacks
//! - [`runner`]: A small scenario runner that fires those callbacks
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepledger::hooks::TimingHooks;
//! use stepledger::ledger::TimingLedger;
//! use stepledger::runner::{load_suite, SuiteRunner};
//! use stepledger::store::SqliteStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(TimingLedger::with_store(SqliteStore::open("step_timings.db")?));
//!
//!     let suite = load_suite("suite.yaml")?;
//!     let runner = SuiteRunner::new(suite, Arc::new(TimingHooks::new(Arc::clone(&ledger))));
//!     runner.run();
//!
//!     println!("{}", ledger.report());
//!     ledger.close()?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod hooks;
pub mod ledger;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use error::{LedgerError, StoreError, SuiteError};
pub use hooks::TimingHooks;
pub use ledger::{StepId, StepRecord, TimingLedger, TimingReport};
pub use runner::{load_suite, SuiteRunner};
pub use store::SqliteStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "StepLedger";
