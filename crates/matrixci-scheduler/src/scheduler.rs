//! Main run orchestration.

use crate::aggregate::RunAggregator;
use crate::matrix::MatrixExpander;
use crate::triggers::TriggerMatcher;

use matrixci_core::Result;
use matrixci_core::events::EventDescriptor;
use matrixci_core::ids::RunId;
use matrixci_core::run::{JobResult, JobSpec, RunResult};
use matrixci_core::workflow::WorkflowDefinition;
use matrixci_runner::{CancelToken, StepRunner};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Default upper bound on concurrently running jobs.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_parallel: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

/// Drives one workflow: trigger check, matrix expansion, bounded parallel
/// execution and aggregation.
pub struct Scheduler {
    workflow: Arc<WorkflowDefinition>,
    runner: StepRunner,
    config: SchedulerConfig,
    trigger_matcher: TriggerMatcher,
    matrix_expander: MatrixExpander,
}

impl Scheduler {
    pub fn new(workflow: WorkflowDefinition, runner: StepRunner, config: SchedulerConfig) -> Self {
        Self {
            workflow: Arc::new(workflow),
            runner,
            config,
            trigger_matcher: TriggerMatcher::new(),
            matrix_expander: MatrixExpander::new(),
        }
    }

    pub fn workflow(&self) -> &WorkflowDefinition {
        &self.workflow
    }

    /// Whether the event starts a run of this workflow.
    pub fn should_run(&self, event: &EventDescriptor) -> bool {
        self.trigger_matcher.matches(event, &self.workflow.triggers)
    }

    /// Expand the workflow's matrix into job specs.
    pub fn expand(&self) -> Result<Vec<JobSpec>> {
        self.matrix_expander.expand(
            &self.workflow.name,
            &self.workflow.matrix,
            &self.workflow.steps,
        )
    }

    /// The jobs an event would run, or `None` if no trigger matches.
    pub fn plan(&self, event: &EventDescriptor) -> Result<Option<Vec<JobSpec>>> {
        if !self.should_run(event) {
            info!(workflow = %self.workflow.name, event = %event, "No trigger matched");
            return Ok(None);
        }
        self.expand().map(Some)
    }

    /// Handle an event end to end. `None` means no trigger matched.
    pub async fn run(&self, event: &EventDescriptor, cancel: &CancelToken) -> Result<Option<RunResult>> {
        let Some(jobs) = self.plan(event)? else {
            return Ok(None);
        };
        self.execute(jobs, cancel).await.map(Some)
    }

    /// Execute job specs with at most `max_parallel` running at once and
    /// aggregate their results.
    ///
    /// Jobs still waiting for a slot when `cancel` fires are recorded as
    /// skipped without being started.
    pub async fn execute(&self, jobs: Vec<JobSpec>, cancel: &CancelToken) -> Result<RunResult> {
        let run_id = RunId::new();
        let aggregator = RunAggregator::new(run_id, &jobs);
        let max_parallel = self.config.max_parallel.max(1);
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let total = jobs.len();

        info!(
            run_id = %run_id,
            workflow = %self.workflow.name,
            jobs = total,
            max_parallel,
            "Starting run"
        );

        let mut join_set = JoinSet::new();
        for job in jobs {
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return JobResult::skipped(job, Vec::new(), 0);
                };
                runner.run_with_cancel(job, &cancel).await
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    info!(
                        run_id = %run_id,
                        job = %result.job.display_name(),
                        status = %result.status,
                        done = results.len() + 1,
                        total,
                        "Job finished"
                    );
                    results.push(result);
                }
                Err(e) => {
                    // The aggregator reports the job as missing.
                    error!(run_id = %run_id, error = %e, "Job task failed");
                }
            }
        }

        if cancel.is_cancelled() {
            warn!(run_id = %run_id, "Run was cancelled");
        }

        aggregator.aggregate(results)
    }
}
