//! Step executor capability and runner configuration.

use async_trait::async_trait;
use matrixci_core::Result;
use matrixci_core::run::JobSpec;
use matrixci_core::workflow::Step;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-step timeout when neither the step nor the workflow sets one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Everything an executor needs to run one step of one job.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Display name of the owning job.
    pub job_name: String,
    pub step: Step,
    /// Read-only source tree the step runs in.
    pub workspace: PathBuf,
    pub env: HashMap<String, String>,
}

/// What the external process reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub exit_code: i32,
    pub duration: Duration,
}

/// Capability to run a step's command as an opaque external process.
///
/// Implementations must stop the underlying process when the returned future
/// is dropped: the step runner drops it on timeout and on cancellation.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutcome>;
}

/// Configuration for step execution.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workspace: PathBuf,
    /// Applied to steps without their own timeout.
    pub default_step_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

/// Environment exposed to every step of `job`: `MATRIXCI_JOB` and one
/// `MATRIXCI_MATRIX_<AXIS>` variable per axis.
pub fn job_environment(job: &JobSpec) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("MATRIXCI_JOB".to_string(), job.display_name());
    for value in &job.assignment {
        env.insert(
            format!("MATRIXCI_MATRIX_{}", env_key(&value.axis)),
            value.value.clone(),
        );
    }
    env
}

fn env_key(axis: &str) -> String {
    axis.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
