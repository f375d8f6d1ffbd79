//! Ledger Diagnostics
//!
//! Non-fatal anomalies observed while timing steps. The ledger never
//! raises these as errors; it hands them to a [`DiagnosticsSink`].

use std::fmt;
use std::sync::Mutex;

use log::warn;

use super::record::StepId;

/// A non-fatal event the ledger swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// `end` was called for an id with no recorded start.
    UnknownStep { step_id: StepId },
    /// A finished timing could not be written to the durable store.
    PersistFailed { step_id: StepId, reason: String },
    /// Persisted rows could not be read back for a report.
    ReportFailed { reason: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownStep { step_id } => {
                write!(f, "No start time recorded for step '{}'", step_id)
            }
            Anomaly::PersistFailed { step_id, reason } => {
                write!(f, "Failed to save step '{}' to store: {}", step_id, reason)
            }
            Anomaly::ReportFailed { reason } => {
                write!(f, "Failed to fetch report from store: {}", reason)
            }
        }
    }
}

/// Receives anomalies from the ledger.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, anomaly: &Anomaly);
}

/// Default sink: every anomaly becomes a warning log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record(&self, anomaly: &Anomaly) {
        warn!("{}", anomaly);
    }
}

/// Keeps anomalies in memory so callers can inspect them afterwards.
#[derive(Debug, Default)]
pub struct CollectingSink {
    anomalies: Mutex<Vec<Anomaly>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        match self.anomalies.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.anomalies().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticsSink for CollectingSink {
    fn record(&self, anomaly: &Anomaly) {
        let mut guard = match self.anomalies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(anomaly.clone());
    }
}
