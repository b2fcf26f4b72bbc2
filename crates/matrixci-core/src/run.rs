//! Job and run execution types.

use crate::ids::{JobId, RunId};
use crate::workflow::Step;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One axis value chosen for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct MatrixValue {
    pub axis: String,
    pub value: String,
}

/// One concrete combination of axis values plus the shared step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobSpec {
    pub id: JobId,
    /// Position in expansion order.
    pub index: usize,
    pub workflow: String,
    /// Axis values in axis declaration order.
    pub assignment: Vec<MatrixValue>,
    pub steps: Vec<Step>,
}

impl JobSpec {
    /// Value assigned to `axis`, if the job has one.
    pub fn value(&self, axis: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|v| v.axis == axis)
            .map(|v| v.value.as_str())
    }

    /// Human-readable name, e.g. `ci (os=ubuntu, toolchain=stable)`.
    pub fn display_name(&self) -> String {
        if self.assignment.is_empty() {
            return self.workflow.clone();
        }

        let parts: Vec<String> = self
            .assignment
            .iter()
            .map(|v| format!("{}={}", v.axis, v.value))
            .collect();

        format!("{} ({})", self.workflow, parts.join(", "))
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepExit {
    Code(i32),
    /// The step exceeded its timeout and was terminated.
    TimedOut,
}

impl StepExit {
    pub fn is_success(&self) -> bool {
        matches!(self, StepExit::Code(0))
    }
}

impl fmt::Display for StepExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepExit::Code(code) => write!(f, "exit {}", code),
            StepExit::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StepResult {
    pub step_name: String,
    pub exit: StepExit,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failed,
    /// Not run to completion because the run was cancelled.
    Skipped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        })
    }
}

/// Terminal outcome of one job.
///
/// Only constructible through [`JobResult::succeeded`], [`JobResult::failed`]
/// and [`JobResult::skipped`], which keep `completed_steps` and
/// `failure_step` consistent with `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    pub job: JobSpec,
    pub status: JobStatus,
    pub completed_steps: Vec<StepResult>,
    pub failure_step: Option<String>,
    pub duration_ms: u64,
}

impl JobResult {
    pub fn succeeded(job: JobSpec, completed_steps: Vec<StepResult>, duration_ms: u64) -> Self {
        debug_assert_eq!(completed_steps.len(), job.steps.len());
        Self {
            job,
            status: JobStatus::Success,
            completed_steps,
            failure_step: None,
            duration_ms,
        }
    }

    /// The last entry of `completed_steps` is the failing step.
    pub fn failed(job: JobSpec, completed_steps: Vec<StepResult>, duration_ms: u64) -> Self {
        let failure_step = completed_steps.last().map(|s| s.step_name.clone());
        debug_assert!(failure_step.is_some());
        Self {
            job,
            status: JobStatus::Failed,
            completed_steps,
            failure_step,
            duration_ms,
        }
    }

    pub fn skipped(job: JobSpec, completed_steps: Vec<StepResult>, duration_ms: u64) -> Self {
        Self {
            job,
            status: JobStatus::Skipped,
            completed_steps,
            failure_step: None,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// Result of the failing step, if the job failed.
    pub fn failure(&self) -> Option<&StepResult> {
        match self.status {
            JobStatus::Failed => self.completed_steps.last(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        })
    }
}

/// A failed job combination and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub job: String,
    pub status: JobStatus,
    pub step: Option<String>,
    pub exit: Option<StepExit>,
}

/// Outcome of all jobs of one run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunResult {
    pub id: RunId,
    pub overall_status: RunStatus,
    /// Sorted by job index.
    pub job_results: Vec<JobResult>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn count(&self, status: JobStatus) -> usize {
        self.job_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Every job that did not succeed, in job order.
    pub fn failures(&self) -> Vec<JobFailure> {
        self.job_results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| JobFailure {
                job: r.job.display_name(),
                status: r.status,
                step: r.failure_step.clone(),
                exit: r.failure().map(|s| s.exit),
            })
            .collect()
    }
}
