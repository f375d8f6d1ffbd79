//! Timing Hooks
//!
//! Binds a [`TimingLedger`] to the runner's lifecycle callbacks: every step
//! is started before it runs and ended after it finishes.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::ledger::{StepId, TimingLedger};
use crate::runner::{ScenarioHooks, StepOutcome, StepRef, SuiteHooks};

/// Suite hooks that time every step with a shared ledger.
pub struct TimingHooks {
    ledger: Arc<TimingLedger>,
}

impl TimingHooks {
    pub fn new(ledger: Arc<TimingLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<TimingLedger> {
        &self.ledger
    }
}

impl SuiteHooks for TimingHooks {
    fn before_scenario(&self, scenario_name: &str) -> Box<dyn ScenarioHooks> {
        Box::new(ScenarioTiming {
            ledger: Arc::clone(&self.ledger),
            scenario_name: scenario_name.to_string(),
            step_ids: HashMap::new(),
        })
    }
}

/// Per-scenario state: the cached scenario name and the ids of steps
/// that have started but not yet ended.
pub struct ScenarioTiming {
    ledger: Arc<TimingLedger>,
    scenario_name: String,
    step_ids: HashMap<usize, StepId>,
}

impl ScenarioHooks for ScenarioTiming {
    fn before_step(&mut self, step: &StepRef<'_>) {
        let step_id = self.ledger.start(&self.scenario_name, step.text);
        self.step_ids.insert(step.index, step_id);
    }

    fn after_step(&mut self, step: &StepRef<'_>, outcome: &StepOutcome) {
        let Some(step_id) = self.step_ids.remove(&step.index) else {
            warn!(
                "No step id cached for '{}' in scenario '{}'",
                step.text, self.scenario_name
            );
            return;
        };

        debug!("Step '{}' finished: {:?}", step_id, outcome);
        self.ledger.end(&step_id, &self.scenario_name, step.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CollectingSink, ReportSource};
    use crate::runner::{Scenario, Suite, SuiteRunner, SuiteStep};
    use crate::store::SqliteStore;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_before_after_pairs_by_index() {
        let ledger = Arc::new(TimingLedger::in_memory());
        let hooks = TimingHooks::new(Arc::clone(&ledger));

        let mut scenario = hooks.before_scenario("Repeat");
        let first = StepRef { index: 0, text: "I press a key" };
        let second = StepRef { index: 1, text: "I press a key" };

        scenario.before_step(&first);
        scenario.before_step(&second);
        scenario.after_step(&second, &StepOutcome::Passed);
        scenario.after_step(&first, &StepOutcome::Passed);

        assert_eq!(ledger.completed_len(), 2);
        assert_eq!(ledger.in_flight_len(), 0);
        assert_eq!(ledger.anomaly_count(), 0);
    }

    #[test]
    fn test_after_without_before_is_ignored() {
        let sink = Arc::new(CollectingSink::new());
        let ledger = Arc::new(TimingLedger::in_memory().with_diagnostics(sink.clone()));
        let hooks = TimingHooks::new(Arc::clone(&ledger));

        let mut scenario = hooks.before_scenario("S");
        scenario.after_step(&StepRef { index: 0, text: "stray" }, &StepOutcome::Passed);

        assert_eq!(ledger.completed_len(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failed_step_still_timed() {
        let ledger = Arc::new(TimingLedger::in_memory());
        let hooks = TimingHooks::new(Arc::clone(&ledger));

        let mut scenario = hooks.before_scenario("S");
        let step = StepRef { index: 0, text: "I break" };
        scenario.before_step(&step);
        scenario.after_step(&step, &StepOutcome::Failed("boom".to_string()));

        assert_eq!(ledger.completed_len(), 1);
    }

    #[test]
    fn test_login_scenario_end_to_end() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::open(temp_dir.path().join("step_timings.db")).unwrap();
        let ledger = Arc::new(TimingLedger::with_store(store));

        let suite = Suite::new("login").with_scenario(
            Scenario::new("LoginScenario")
                .with_step(SuiteStep::new("I click submit").with_sleep_ms(150)),
        );
        let summary = SuiteRunner::new(suite, Arc::new(TimingHooks::new(Arc::clone(&ledger)))).run();
        assert_eq!(summary.exit_status(), 0);

        let report = ledger.report();
        assert_eq!(report.source, ReportSource::Store);
        assert_eq!(report.len(), 1);

        let record = &report.records[0];
        assert!(record.duration >= Duration::from_millis(150));

        let text = report.to_string();
        let line = text
            .lines()
            .find(|l| l.contains("LoginScenario") && l.contains("I click submit"))
            .unwrap();
        assert!(line.contains("Timestamp:"));

        let printed_ms: u64 = line
            .split("Duration: ")
            .nth(1)
            .and_then(|rest| rest.split(" ms").next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(printed_ms >= 150);

        ledger.close().unwrap();
    }

    #[test]
    fn test_parallel_scenarios_time_every_step() {
        let ledger = Arc::new(TimingLedger::in_memory());

        let suite = (0..20).fold(Suite::new("wide"), |suite, i| {
            let scenario = (0..5).fold(Scenario::new(format!("S{}", i)), |s, _| {
                s.with_step(SuiteStep::new("I repeat myself").with_sleep_ms(1))
            });
            suite.with_scenario(scenario)
        });

        let mut runner = SuiteRunner::new(suite, Arc::new(TimingHooks::new(Arc::clone(&ledger))));
        runner.set_max_parallel(8);
        runner.run();

        assert_eq!(ledger.completed_len(), 100);
        assert_eq!(ledger.in_flight_len(), 0);
        assert_eq!(ledger.anomaly_count(), 0);
    }
}
