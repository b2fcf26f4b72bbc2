//! Reduction of per-job results into a run result.

use matrixci_core::ids::{JobId, RunId};
use matrixci_core::run::{JobResult, JobSpec, RunResult, RunStatus};
use matrixci_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{error, info};

/// Success iff every job succeeded. Independent of result order.
pub fn overall_status<'a>(results: impl IntoIterator<Item = &'a JobResult>) -> RunStatus {
    if results.into_iter().all(JobResult::is_success) {
        RunStatus::Success
    } else {
        RunStatus::Failed
    }
}

/// Collects the results of one run and checks each expected job reported
/// exactly once.
pub struct RunAggregator {
    run_id: RunId,
    expected: HashMap<JobId, String>,
    started: Instant,
}

impl RunAggregator {
    pub fn new(run_id: RunId, expected: &[JobSpec]) -> Self {
        Self {
            run_id,
            expected: expected
                .iter()
                .map(|job| (job.id, job.display_name()))
                .collect(),
            started: Instant::now(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Build the run result. A missing, duplicated or unexpected job result
    /// is an orchestration bug and fails the aggregation.
    pub fn aggregate(&self, mut results: Vec<JobResult>) -> Result<RunResult> {
        let mut seen = HashSet::with_capacity(results.len());
        for result in &results {
            let id = result.job.id;
            if !self.expected.contains_key(&id) {
                error!(run_id = %self.run_id, job_id = %id, "Result for unknown job");
                return Err(Error::AggregationInconsistency(format!(
                    "result for unexpected job {} ({})",
                    id,
                    result.job.display_name()
                )));
            }
            if !seen.insert(id) {
                error!(run_id = %self.run_id, job_id = %id, "Duplicate job result");
                return Err(Error::AggregationInconsistency(format!(
                    "duplicate result for job {}",
                    self.expected[&id]
                )));
            }
        }

        let mut missing: Vec<&str> = self
            .expected
            .iter()
            .filter(|(id, _)| !seen.contains(*id))
            .map(|(_, name)| name.as_str())
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            error!(run_id = %self.run_id, missing = missing.len(), "Job results missing");
            return Err(Error::AggregationInconsistency(format!(
                "missing results for: {}",
                missing.join("; ")
            )));
        }

        results.sort_by_key(|r| r.job.index);
        let status = overall_status(&results);
        let duration_ms = self.started.elapsed().as_millis() as u64;

        info!(
            run_id = %self.run_id,
            status = %status,
            jobs = results.len(),
            duration_ms,
            "Run aggregated"
        );

        Ok(RunResult {
            id: self.run_id,
            overall_status: status,
            job_results: results,
            duration_ms,
            completed_at: chrono::Utc::now(),
        })
    }
}
