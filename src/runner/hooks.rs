//! Lifecycle Hooks
//!
//! Callbacks the runner fires around scenarios and steps.

use super::step::StepOutcome;

/// The step a hook is being called for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRef<'a> {
    /// Position of the step within its scenario
    pub index: usize,
    pub text: &'a str,
}

/// Suite-level hooks, shared by every worker thread.
pub trait SuiteHooks: Send + Sync {
    /// Called once before a scenario's first step. The returned value
    /// receives that scenario's step callbacks and lives until it ends.
    fn before_scenario(&self, scenario_name: &str) -> Box<dyn ScenarioHooks>;
}

/// Per-scenario step callbacks. Always invoked from a single thread.
pub trait ScenarioHooks: Send {
    fn before_step(&mut self, step: &StepRef<'_>);

    fn after_step(&mut self, step: &StepRef<'_>, outcome: &StepOutcome);
}
