//! Scenario Runner
//!
//! A small behavior-driven runner that executes YAML-described scenarios
//! and drives lifecycle hooks around every step.
//!
//! # Architecture
//!
//! - [`suite`]: Suite, scenario and step definitions plus the YAML loader
//! - [`engine`]: Parallel scenario execution
//! - [`step`]: Individual step execution
//! - [`hooks`]: Hook traits fired by the engine

pub mod engine;
pub mod hooks;
pub mod step;
pub mod suite;

pub use engine::{ScenarioResult, StepResult, SuiteRunner, SuiteSummary};
pub use hooks::{ScenarioHooks, StepRef, SuiteHooks};
pub use step::StepOutcome;
pub use suite::{load_suite, parse_suite, Scenario, Suite, SuiteStep};
