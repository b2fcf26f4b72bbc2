//! Terminal output for plans and run results.

use crate::config::OutputFormat;
use console::style;
use matrixci_core::run::{JobResult, JobSpec, JobStatus, RunResult, RunStatus};
use serde::Serialize;

fn status_marker(status: JobStatus) -> console::StyledObject<&'static str> {
    match status {
        JobStatus::Success => style("✓").green(),
        JobStatus::Failed => style("✗").red(),
        JobStatus::Skipped => style("-").yellow(),
    }
}

/// Write `value` to stdout in a structured format.
pub fn structured<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Table => {}
    }
    Ok(())
}

/// Print the jobs a run would execute.
pub fn plan(jobs: &[JobSpec], format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if format != OutputFormat::Table {
        return structured(&jobs, format);
    }

    println!("{} {} job(s) planned", style("▶").cyan(), jobs.len());
    for job in jobs {
        let steps: Vec<&str> = job.steps.iter().map(|s| s.name.as_str()).collect();
        println!(
            "  {:>3}  {}  {}",
            job.index,
            style(job.display_name()).bold(),
            style(steps.join(" → ")).dim()
        );
    }
    Ok(())
}

fn job_line(result: &JobResult) -> String {
    let detail = match (result.status, result.failure()) {
        (JobStatus::Failed, Some(step)) => format!("{} ({})", step.step_name, step.exit),
        (JobStatus::Skipped, _) => format!(
            "cancelled after {}/{} steps",
            result.completed_steps.len(),
            result.job.steps.len()
        ),
        _ => format!("{} steps", result.completed_steps.len()),
    };

    format!(
        "  {} {}  {}  {}",
        status_marker(result.status),
        style(result.job.display_name()).bold(),
        style(detail).dim(),
        style(format!("{}ms", result.duration_ms)).dim()
    )
}

/// Print the outcome of a run.
pub fn run_result(run: &RunResult, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if format != OutputFormat::Table {
        return structured(run, format);
    }

    println!();
    for result in &run.job_results {
        println!("{}", job_line(result));
    }
    println!();

    let summary = format!(
        "{} passed, {} failed, {} skipped in {}ms",
        run.count(JobStatus::Success),
        run.count(JobStatus::Failed),
        run.count(JobStatus::Skipped),
        run.duration_ms
    );

    match run.overall_status {
        RunStatus::Success => println!("{} Run {} succeeded: {}", style("✓").green(), run.id, summary),
        RunStatus::Failed => {
            println!("{} Run {} failed: {}", style("✗").red(), run.id, summary);
            for failure in run.failures() {
                match (&failure.step, failure.exit) {
                    (Some(step), Some(exit)) => {
                        println!("  {} failed at step {} ({})", failure.job, step, exit)
                    }
                    _ => println!("  {} {}", failure.job, failure.status),
                }
            }
        }
    }
    Ok(())
}
