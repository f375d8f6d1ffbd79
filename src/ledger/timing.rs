//! Timing Ledger
//!
//! Records per-step start times, computes durations when steps end and
//! optionally persists them. Shared between runner threads behind an `Arc`;
//! every method takes `&self`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};

use super::diagnostics::{Anomaly, DiagnosticsSink, LogSink};
use super::record::{whole_millis, ReportSource, StepId, StepRecord, TimingReport};
use crate::error::LedgerError;
use crate::store::{InsertOutcome, NewTiming, TimingStore};

/// A step that has started but not yet ended.
#[derive(Debug, Clone)]
struct InFlightStep {
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Concurrent ledger of step timings.
///
/// The id counter belongs to the ledger and restarts at 1 for every new
/// ledger. Two runs persisting to the same database file therefore produce
/// the same ids; the second run's inserts are ignored as duplicates and
/// [`TimingLedger::report`] lists the first run's durations for them. Use a
/// fresh database file per run when that matters.
///
/// # Example
///
/// ```rust
/// use std::thread;
/// use std::time::Duration;
/// use stepledger::ledger::TimingLedger;
///
/// let ledger = TimingLedger::in_memory();
/// let id = ledger.start("LoginScenario", "I click submit");
/// thread::sleep(Duration::from_millis(5));
/// let elapsed = ledger.end(&id, "LoginScenario", "I click submit");
///
/// assert!(elapsed.unwrap() >= Duration::from_millis(5));
/// println!("{}", ledger.report());
/// ```
pub struct TimingLedger {
    in_flight: DashMap<StepId, InFlightStep>,
    completed: DashMap<StepId, StepRecord>,
    sequence: AtomicU64,
    anomalies: AtomicU64,
    store: Option<Box<dyn TimingStore>>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl TimingLedger {
    /// Creates a ledger that keeps timings in memory only.
    pub fn in_memory() -> Self {
        Self {
            in_flight: DashMap::new(),
            completed: DashMap::new(),
            sequence: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            store: None,
            diagnostics: Arc::new(LogSink),
        }
    }

    /// Creates a ledger that also writes every finished timing to `store`.
    pub fn with_store(store: impl TimingStore + 'static) -> Self {
        Self {
            store: Some(Box::new(store)),
            ..Self::in_memory()
        }
    }

    /// Replaces the default log-only diagnostics sink.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Returns true if finished timings are persisted.
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Marks the start of a step and returns its unique id.
    ///
    /// Ids embed a per-ledger counter starting at 1, so repeated step text
    /// still yields distinct ids.
    pub fn start(&self, scenario_name: &str, step_text: &str) -> StepId {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let step_id = StepId::generate(scenario_name, step_text, sequence);

        self.in_flight.insert(
            step_id.clone(),
            InFlightStep {
                started_at: Utc::now(),
                started: Instant::now(),
            },
        );

        debug!("Started step '{}'", step_id);
        step_id
    }

    /// Marks the end of a step started with [`TimingLedger::start`].
    ///
    /// Returns the measured duration, or `None` when no start was recorded
    /// for `step_id`. Persistence problems are reported to the diagnostics
    /// sink and never returned.
    pub fn end(&self, step_id: &StepId, scenario_name: &str, step_text: &str) -> Option<Duration> {
        let Some((_, in_flight)) = self.in_flight.remove(step_id) else {
            self.report_anomaly(Anomaly::UnknownStep {
                step_id: step_id.clone(),
            });
            return None;
        };

        let duration = in_flight.started.elapsed();
        let record = StepRecord {
            step_id: step_id.clone(),
            scenario_name: scenario_name.to_string(),
            step_text: step_text.to_string(),
            started_at: Some(in_flight.started_at),
            duration,
            created_at: None,
        };
        self.completed.insert(step_id.clone(), record);

        debug!("Step '{}' took {} ms", step_id, whole_millis(duration));

        if let Some(store) = &self.store {
            self.persist(store.as_ref(), step_id, scenario_name, step_text, duration);
        }

        Some(duration)
    }

    fn persist(
        &self,
        store: &dyn TimingStore,
        step_id: &StepId,
        scenario_name: &str,
        step_text: &str,
        duration: Duration,
    ) {
        let timing = NewTiming {
            step_id,
            scenario_name,
            step_text,
            duration_ms: whole_millis(duration),
        };

        match store.insert(&timing) {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::Duplicate) => {
                debug!("Step '{}' already persisted, ignoring", step_id);
            }
            Err(e) => self.report_anomaly(Anomaly::PersistFailed {
                step_id: step_id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Lists every captured timing.
    ///
    /// Reads from the durable store when one is configured; if that read
    /// fails the in-memory timings are listed instead.
    pub fn report(&self) -> TimingReport {
        if let Some(store) = &self.store {
            match store.records() {
                Ok(records) => {
                    return TimingReport {
                        source: ReportSource::Store,
                        records,
                    }
                }
                Err(e) => self.report_anomaly(Anomaly::ReportFailed {
                    reason: e.to_string(),
                }),
            }
        }

        TimingReport {
            source: ReportSource::Memory,
            records: self.completed.iter().map(|entry| entry.value().clone()).collect(),
        }
    }

    /// Releases the durable store. A ledger without a store has nothing to
    /// release and always succeeds.
    pub fn close(&self) -> Result<(), LedgerError> {
        if let Some(store) = &self.store {
            store.close()?;
            info!("Timing store closed");
        }
        Ok(())
    }

    /// Snapshot of all computed durations.
    pub fn durations(&self) -> HashMap<StepId, Duration> {
        self.completed
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().duration))
            .collect()
    }

    /// Duration of one finished step.
    pub fn duration_of(&self, step_id: &StepId) -> Option<Duration> {
        self.completed.get(step_id).map(|record| record.duration)
    }

    /// Number of finished steps.
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// Number of started steps still waiting for `end`.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of anomalies reported so far.
    pub fn anomaly_count(&self) -> u64 {
        self.anomalies.load(Ordering::SeqCst)
    }

    fn report_anomaly(&self, anomaly: Anomaly) {
        self.anomalies.fetch_add(1, Ordering::SeqCst);
        self.diagnostics.record(&anomaly);
    }
}

impl Default for TimingLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}
