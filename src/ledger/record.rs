//! Step Records
//!
//! Identifiers and finished timing records produced by the ledger,
//! plus the flat report built from them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

/// Unique key correlating the start and end of one step invocation.
///
/// Generated ids have the shape `{scenario}-{step text}-{counter}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Builds the id for the `sequence`-th started step.
    pub(crate) fn generate(scenario_name: &str, step_text: &str, sequence: u64) -> Self {
        Self(format!("{}-{}-{}", scenario_name, step_text, sequence))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A finished step timing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step_id: StepId,
    pub scenario_name: String,
    pub step_text: String,
    /// Wall-clock start; only known for records captured in this process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Insertion time assigned by the durable store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

impl StepRecord {
    /// Duration truncated to whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        whole_millis(self.duration)
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StepID: {}, Scenario: {}, Step: {}, Duration: {} ms",
            self.step_id,
            self.scenario_name,
            self.step_text,
            self.duration_ms()
        )?;
        if let Some(created_at) = self.created_at {
            write!(f, ", Timestamp: {}", created_at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(whole_millis(*duration))
}

/// Where a report's rows were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    Store,
    Memory,
}

impl fmt::Display for ReportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportSource::Store => f.write_str("SQLite"),
            ReportSource::Memory => f.write_str("in-memory"),
        }
    }
}

/// Flat listing of captured step timings. Rows carry no defined order.
#[derive(Debug, Clone, Serialize)]
pub struct TimingReport {
    pub source: ReportSource,
    pub records: Vec<StepRecord>,
}

impl TimingReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finds the record for a step id.
    pub fn find(&self, step_id: &StepId) -> Option<&StepRecord> {
        self.records.iter().find(|r| &r.step_id == step_id)
    }

    /// Renders the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Step Duration Report ({}) ===", self.source)?;
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}
