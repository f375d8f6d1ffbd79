//! Scenario Suite Definition
//!
//! Data structures for a suite of scenarios and the YAML loader.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: checkout
//! scenarios:
//!   - name: LoginScenario
//!     steps:
//!       - text: I open the login page
//!         command: test -n "$HOME"
//!       - text: I click submit
//!         sleep_ms: 150
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SuiteError;

/// Name used when the YAML omits one.
fn default_suite_name() -> String {
    "suite".to_string()
}

/// A named collection of scenarios.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Suite {
    #[serde(default = "default_suite_name")]
    pub name: String,

    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// One test case: an ordered list of steps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Display name passed to the before-scenario hook
    pub name: String,

    #[serde(default)]
    pub steps: Vec<SuiteStep>,
}

/// A single step and what running it means.
///
/// A step sleeps for `sleep_ms` (if set), then runs `command` with bash
/// (if set). A non-zero exit fails the step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuiteStep {
    /// Step text as it would appear in a feature file
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Total number of steps across all scenarios.
    pub fn step_count(&self) -> usize {
        self.scenarios.iter().map(|s| s.steps.len()).sum()
    }

    /// Checks the suite can be run.
    pub fn validate(&self) -> Result<(), SuiteError> {
        if self.scenarios.is_empty() {
            return Err(SuiteError::Invalid(format!(
                "suite '{}' has no scenarios",
                self.name
            )));
        }

        for (i, scenario) in self.scenarios.iter().enumerate() {
            if scenario.name.trim().is_empty() {
                return Err(SuiteError::Invalid(format!("scenario #{} has no name", i + 1)));
            }

            if scenario.steps.is_empty() {
                warn!("Scenario '{}' has no steps", scenario.name);
            }

            for step in &scenario.steps {
                if step.text.trim().is_empty() {
                    return Err(SuiteError::Invalid(format!(
                        "scenario '{}' has a step with no text",
                        scenario.name
                    )));
                }
                if step.sleep_ms.is_none() && step.command.is_none() {
                    return Err(SuiteError::Invalid(format!(
                        "step '{}' in scenario '{}' needs sleep_ms or command",
                        step.text, scenario.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: SuiteStep) -> Self {
        self.steps.push(step);
        self
    }
}

impl SuiteStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sleep_ms: None,
            command: None,
        }
    }

    pub fn with_sleep_ms(mut self, ms: u64) -> Self {
        self.sleep_ms = Some(ms);
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// Parses and validates a suite from YAML text.
pub fn parse_suite(yaml: &str) -> Result<Suite, SuiteError> {
    let suite: Suite = serde_yaml::from_str(yaml)?;
    suite.validate()?;
    Ok(suite)
}

/// Loads a suite from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use stepledger::runner::load_suite;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let suite = load_suite("suite.yaml")?;
///     println!("Loaded {} scenarios", suite.scenarios.len());
///     Ok(())
/// }
/// ```
pub fn load_suite(path: impl AsRef<Path>) -> Result<Suite, SuiteError> {
    let path = path.as_ref();
    info!("Loading suite from: {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|source| SuiteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("YAML content loaded ({} bytes)", yaml.len());

    let suite = parse_suite(&yaml)?;
    info!(
        "Parsed suite '{}': {} scenarios, {} steps",
        suite.name,
        suite.scenarios.len(),
        suite.step_count()
    );
    Ok(suite)
}
