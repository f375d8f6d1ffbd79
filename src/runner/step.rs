//! Individual Step Execution
//!
//! Runs one suite step: an optional sleep followed by an optional bash
//! command in the configured working directory.

use std::error::Error;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use log::{debug, error};

use super::suite::SuiteStep;

/// Outcome of a step, handed to the after-step hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Failed(String),
    /// An earlier step in the scenario failed; this one never ran.
    Skipped,
}

impl StepOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}

/// Executes a single step.
///
/// # Returns
///
/// * `Ok(())` - Step completed successfully
/// * `Err` - The command could not be spawned or exited non-zero
pub fn execute_step(
    step: &SuiteStep,
    working_dir: &Option<PathBuf>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(ms) = step.sleep_ms {
        thread::sleep(Duration::from_millis(ms));
    }

    let Some(command_text) = &step.command else {
        return Ok(());
    };

    let mut cmd = Command::new("bash");
    cmd.arg("-c").arg(command_text);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
        debug!("Executing in directory: {}", dir.display());
    }

    let output = cmd.output()?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Step '{}' output:\n{}", step.text, stdout);
        }
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            "Step '{}' failed with exit code: {:?}",
            step.text,
            output.status.code()
        );
        if !stderr.trim().is_empty() {
            error!("stderr:\n{}", stderr);
        }

        Err(format!(
            "command exited with status {:?}",
            output.status.code()
        )
        .into())
    }
}
