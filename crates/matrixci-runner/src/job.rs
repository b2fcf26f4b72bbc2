//! Sequential execution of one job's steps.

use crate::cancel::CancelToken;
use crate::runner::{RunnerConfig, StepContext, StepExecutor, job_environment};
use matrixci_core::run::{JobResult, JobSpec, StepExit, StepResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Runs a job's steps in order, stopping at the first failure.
///
/// Step failures, timeouts and executor errors become a `Failed` result;
/// they are never returned as errors.
#[derive(Clone)]
pub struct StepRunner {
    executor: Arc<dyn StepExecutor>,
    config: RunnerConfig,
}

enum StepEnd {
    Finished(StepResult),
    Cancelled,
}

impl StepRunner {
    pub fn new(executor: Arc<dyn StepExecutor>, config: RunnerConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run a job to a terminal status.
    pub async fn run(&self, job: JobSpec) -> JobResult {
        self.run_with_cancel(job, &CancelToken::never()).await
    }

    /// Run a job, abandoning it as `Skipped` once `cancel` fires.
    pub async fn run_with_cancel(&self, job: JobSpec, cancel: &CancelToken) -> JobResult {
        let start = Instant::now();
        let job_name = job.display_name();
        let env = job_environment(&job);
        let mut completed: Vec<StepResult> = Vec::with_capacity(job.steps.len());

        info!(job = %job_name, steps = job.steps.len(), "Starting job");

        for idx in 0..job.steps.len() {
            if cancel.is_cancelled() {
                info!(job = %job_name, remaining = job.steps.len() - idx, "Run cancelled, skipping remaining steps");
                return JobResult::skipped(job, completed, elapsed_ms(start));
            }

            let ctx = StepContext {
                job_name: job_name.clone(),
                step: job.steps[idx].clone(),
                workspace: self.config.workspace.clone(),
                env: env.clone(),
            };

            let result = match self.run_step(&ctx, cancel).await {
                StepEnd::Finished(result) => result,
                StepEnd::Cancelled => {
                    warn!(job = %job_name, step = %ctx.step.name, "Step terminated by cancellation");
                    return JobResult::skipped(job, completed, elapsed_ms(start));
                }
            };

            let success = result.exit.is_success();
            completed.push(result);

            if !success {
                warn!(job = %job_name, step = %ctx.step.name, "Job failed");
                return JobResult::failed(job, completed, elapsed_ms(start));
            }
        }

        info!(job = %job_name, duration_ms = elapsed_ms(start), "Job succeeded");
        JobResult::succeeded(job, completed, elapsed_ms(start))
    }

    async fn run_step(&self, ctx: &StepContext, cancel: &CancelToken) -> StepEnd {
        let limit = ctx.step.timeout().unwrap_or(self.config.default_step_timeout);
        let start = Instant::now();

        info!(job = %ctx.job_name, step = %ctx.step.name, timeout_secs = limit.as_secs(), "Running step");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StepEnd::Cancelled,
            outcome = timeout(limit, self.executor.execute(ctx)) => outcome,
        };

        let (exit, duration_ms) = match outcome {
            Ok(Ok(outcome)) => (
                StepExit::Code(outcome.exit_code),
                outcome.duration.as_millis() as u64,
            ),
            Ok(Err(e)) => {
                error!(job = %ctx.job_name, step = %ctx.step.name, error = %e, "Step execution error");
                (StepExit::Code(-1), elapsed_ms(start))
            }
            Err(_) => {
                warn!(job = %ctx.job_name, step = %ctx.step.name, timeout_secs = limit.as_secs(), "Step timed out");
                (StepExit::TimedOut, elapsed_ms(start))
            }
        };

        info!(job = %ctx.job_name, step = %ctx.step.name, exit = %exit, duration_ms, "Step finished");

        StepEnd::Finished(StepResult {
            step_name: ctx.step.name.clone(),
            exit,
            duration_ms,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::fakes::{Scripted, ScriptedExecutor};
    use matrixci_core::ids::JobId;
    use matrixci_core::run::JobStatus;
    use matrixci_core::workflow::Step;
    use std::time::Duration;

    fn job(steps: &[&str]) -> JobSpec {
        JobSpec {
            id: JobId::new(),
            index: 0,
            workflow: "ci".into(),
            assignment: vec![],
            steps: steps.iter().map(|s| Step::new(*s, format!("run {}", s))).collect(),
        }
    }

    fn runner(executor: Arc<ScriptedExecutor>) -> StepRunner {
        let config = RunnerConfig {
            workspace: ".".into(),
            default_step_timeout: Duration::from_secs(5),
        };
        StepRunner::new(executor, config)
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let executor = Arc::new(ScriptedExecutor::new());
        let result = runner(executor.clone())
            .run(job(&["check-format", "run-tests"]))
            .await;

        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.completed_steps.len(), 2);
        assert!(result.failure_step.is_none());
        assert_eq!(executor.steps_called(), vec!["check-format", "run-tests"]);
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let executor = Arc::new(ScriptedExecutor::new().on_step("check-format", Scripted::Exit(1)));
        let result = runner(executor.clone())
            .run(job(&["check-format", "run-tests"]))
            .await;

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.failure_step.as_deref(), Some("check-format"));
        assert_eq!(result.completed_steps.len(), 1);
        assert_eq!(result.completed_steps[0].exit, StepExit::Code(1));
        assert_eq!(executor.steps_called(), vec!["check-format"]);
    }

    #[tokio::test]
    async fn test_failure_in_middle_keeps_prefix() {
        let executor = Arc::new(ScriptedExecutor::new().on_step("b", Scripted::Exit(2)));
        let result = runner(executor.clone()).run(job(&["a", "b", "c", "d"])).await;

        let names: Vec<&str> = result
            .completed_steps
            .iter()
            .map(|s| s.step_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(result.failure_step.as_deref(), Some("b"));
        assert_eq!(executor.steps_called(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_as_sentinel() {
        let executor = Arc::new(ScriptedExecutor::new().on_step("run-tests", Scripted::Hang));
        let mut job = job(&["check-format", "run-tests"]);
        job.steps[1] = job.steps[1].clone().with_timeout(Duration::from_secs(1));

        let result = runner(executor).run(job).await;

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.failure_step.as_deref(), Some("run-tests"));
        assert_eq!(result.completed_steps[1].exit, StepExit::TimedOut);
    }

    #[tokio::test]
    async fn test_default_timeout_applies() {
        let executor = Arc::new(ScriptedExecutor::new().on_step("a", Scripted::Hang));
        let config = RunnerConfig {
            workspace: ".".into(),
            default_step_timeout: Duration::from_millis(50),
        };
        let result = StepRunner::new(executor, config).run(job(&["a"])).await;
        assert_eq!(result.completed_steps[0].exit, StepExit::TimedOut);
    }

    #[tokio::test]
    async fn test_executor_error_fails_job() {
        let executor = Arc::new(
            ScriptedExecutor::new().on_step("a", Scripted::Error("spawn failed".into())),
        );
        let result = runner(executor.clone()).run(job(&["a", "b"])).await;

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.completed_steps[0].exit, StepExit::Code(-1));
        assert_eq!(executor.steps_called(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_is_skipped() {
        let executor = Arc::new(ScriptedExecutor::new());
        let handle = CancelHandle::new();
        handle.cancel();

        let result = runner(executor.clone())
            .run_with_cancel(job(&["a", "b"]), &handle.token())
            .await;

        assert_eq!(result.status, JobStatus::Skipped);
        assert!(result.completed_steps.is_empty());
        assert!(result.failure_step.is_none());
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_step_skips_rest() {
        let executor = Arc::new(ScriptedExecutor::new().on_step("b", Scripted::Hang));
        let handle = CancelHandle::new();
        let token = handle.token();
        let runner = runner(executor.clone());

        let task = tokio::spawn(async move { runner.run_with_cancel(job(&["a", "b", "c"]), &token).await });

        executor.wait_for_calls(2).await;
        handle.cancel();

        let result = task.await.unwrap();
        assert_eq!(result.status, JobStatus::Skipped);
        assert_eq!(result.completed_steps.len(), 1);
        assert_eq!(executor.steps_called(), vec!["a", "b"]);
        assert_eq!(executor.in_flight(), 0);
    }
}
