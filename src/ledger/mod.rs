//! Step Timing Ledger
//!
//! Captures how long each test step takes.
//!
//! # Components
//!
//! - [`TimingLedger`]: concurrent start/end bookkeeping and reporting
//! - [`StepId`], [`StepRecord`], [`TimingReport`]: ids and finished timings
//! - [`DiagnosticsSink`]: where non-fatal anomalies go

pub mod diagnostics;
pub mod record;
pub mod timing;

pub use diagnostics::{Anomaly, CollectingSink, DiagnosticsSink, LogSink};
pub use record::{ReportSource, StepId, StepRecord, TimingReport};
pub use timing::TimingLedger;
