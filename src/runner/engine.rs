//! Suite Execution Engine
//!
//! Runs the scenarios of a suite on a bounded pool of worker threads and
//! fires the lifecycle hooks around every step. Steps within a scenario
//! run in order; scenarios run in parallel.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};

use super::hooks::{StepRef, SuiteHooks};
use super::step::{execute_step, StepOutcome};
use super::suite::{Scenario, Suite};

/// Result of one step in a finished scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub text: String,
    pub outcome: StepOutcome,
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    /// True when no step failed or was skipped.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.outcome.is_passed())
    }
}

/// Outcome of a whole suite run.
#[derive(Debug, Clone)]
pub struct SuiteSummary {
    /// Scenario results in suite order
    pub scenarios: Vec<ScenarioResult>,
    pub elapsed: Duration,
}

impl SuiteSummary {
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    /// Process exit status for the run: 0 if every scenario passed.
    pub fn exit_status(&self) -> u8 {
        if self.failed() == 0 {
            0
        } else {
            1
        }
    }
}

/// Scenario runner.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stepledger::hooks::TimingHooks;
/// use stepledger::ledger::TimingLedger;
/// use stepledger::runner::{load_suite, SuiteRunner};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let ledger = Arc::new(TimingLedger::in_memory());
///     let suite = load_suite("suite.yaml")?;
///
///     let mut runner = SuiteRunner::new(suite, Arc::new(TimingHooks::new(Arc::clone(&ledger))));
///     runner.set_max_parallel(4);
///     let summary = runner.run();
///
///     println!("{}", ledger.report());
///     std::process::exit(summary.exit_status() as i32);
/// }
/// ```
pub struct SuiteRunner {
    suite: Suite,
    hooks: Arc<dyn SuiteHooks>,
    max_parallel: usize,
    working_dir: Option<PathBuf>,
}

impl SuiteRunner {
    /// Creates a runner; parallelism defaults to the number of CPUs.
    pub fn new(suite: Suite, hooks: Arc<dyn SuiteHooks>) -> Self {
        Self {
            suite,
            hooks,
            max_parallel: num_cpus::get(),
            working_dir: None,
        }
    }

    /// Sets the maximum number of scenarios running at once (minimum 1).
    pub fn set_max_parallel(&mut self, max: usize) {
        self.max_parallel = max.max(1);
    }

    /// Sets the working directory for step commands.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Runs every scenario and waits for all of them.
    pub fn run(&self) -> SuiteSummary {
        let start_time = Instant::now();
        let total = self.suite.scenarios.len();

        info!(
            "Running suite '{}' ({} scenarios, max parallel: {})",
            self.suite.name, total, self.max_parallel
        );

        let (tx, rx): (
            Sender<(usize, ScenarioResult)>,
            Receiver<(usize, ScenarioResult)>,
        ) = channel();

        let mut results: Vec<Option<ScenarioResult>> = vec![None; total];
        let mut pending = self.suite.scenarios.iter().cloned().enumerate();
        let mut running_count = 0;
        let mut finished = 0;

        while finished < total {
            while running_count < self.max_parallel {
                let Some((index, scenario)) = pending.next() else {
                    break;
                };

                let tx = tx.clone();
                let hooks = Arc::clone(&self.hooks);
                let working_dir = self.working_dir.clone();

                thread::spawn(move || {
                    let name = scenario.name.clone();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_scenario(&scenario, hooks.as_ref(), &working_dir)
                    }))
                    .unwrap_or_else(|_| {
                        error!("Scenario '{}' panicked", name);
                        ScenarioResult {
                            name: name.clone(),
                            steps: vec![StepResult {
                                text: "<panic>".to_string(),
                                outcome: StepOutcome::Failed("worker panicked".to_string()),
                            }],
                        }
                    });

                    if let Err(e) = tx.send((index, result)) {
                        error!("Failed to send completion signal: {}", e);
                    }
                });

                running_count += 1;
            }

            let Ok((index, result)) = rx.recv() else {
                error!("Scenario workers disconnected early");
                break;
            };

            running_count -= 1;
            finished += 1;

            if result.passed() {
                info!("Scenario '{}' passed", result.name);
            } else {
                error!("Scenario '{}' failed", result.name);
            }
            results[index] = Some(result);
        }

        let summary = SuiteSummary {
            scenarios: results.into_iter().flatten().collect(),
            elapsed: start_time.elapsed(),
        };

        info!(
            "{} scenarios ({} passed, {} failed) in {:.2?}",
            summary.scenarios.len(),
            summary.passed(),
            summary.failed(),
            summary.elapsed
        );
        summary
    }
}

/// Runs one scenario's steps in order, firing hooks around each.
///
/// After the first failure the remaining steps are skipped and no hooks
/// fire for them.
fn run_scenario(
    scenario: &Scenario,
    hooks: &dyn SuiteHooks,
    working_dir: &Option<PathBuf>,
) -> ScenarioResult {
    let mut observer = hooks.before_scenario(&scenario.name);
    let mut steps = Vec::with_capacity(scenario.steps.len());
    let mut failed = false;

    for (index, step) in scenario.steps.iter().enumerate() {
        if failed {
            steps.push(StepResult {
                text: step.text.clone(),
                outcome: StepOutcome::Skipped,
            });
            continue;
        }

        let step_ref = StepRef {
            index,
            text: &step.text,
        };

        observer.before_step(&step_ref);
        let outcome = match execute_step(step, working_dir) {
            Ok(()) => StepOutcome::Passed,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        observer.after_step(&step_ref, &outcome);

        failed = !outcome.is_passed();
        steps.push(StepResult {
            text: step.text.clone(),
            outcome,
        });
    }

    ScenarioResult {
        name: scenario.name.clone(),
        steps,
    }
}
