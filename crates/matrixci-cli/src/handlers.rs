//! Command handlers.

use crate::commands::RunArgs;
use crate::config::{CliConfig, OutputFormat, RunSettings};
use crate::render;
use console::style;
use matrixci_core::events::EventDescriptor;
use matrixci_core::workflow::WorkflowDefinition;
use matrixci_runner::{CancelHandle, RunnerConfig, ShellExecutor, StepRunner};
use matrixci_scheduler::{Scheduler, SchedulerConfig};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

const TEMPLATE: &str = r#"name: ci

triggers:
  - kind: push
    branches: ["main"]
    tags: ["v*"]
  - kind: pull_request

matrix:
  - name: os
    values: [ubuntu, macos]
  - name: toolchain
    values: [stable, nightly]

steps:
  - name: build
    run: echo "Building on $MATRIXCI_MATRIX_OS with $MATRIXCI_MATRIX_TOOLCHAIN"
  - name: test
    run: echo "Testing $MATRIXCI_JOB"
    timeout_seconds: 600
"#;

/// Write a template workflow.
pub fn init(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    std::fs::write(path, TEMPLATE)?;
    println!("{} Created {}", style("✓").green(), path.display());
    Ok(())
}

/// Validate a workflow file.
pub fn validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let definition = WorkflowDefinition::from_file(path)?;

    println!(
        "{} Workflow \"{}\" is valid",
        style("✓").green(),
        definition.name
    );
    println!("  Triggers: {}", definition.triggers.len());
    for axis in &definition.matrix {
        println!("    - {}: {}", axis.name, axis.values.join(", "));
    }
    println!("  Jobs: {}", definition.job_count());
    println!("  Steps: {}", definition.steps.len());
    for step in &definition.steps {
        println!("    - {}", step.name);
    }

    Ok(())
}

/// Print the JSON schema of the workflow format.
pub fn schema() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(WorkflowDefinition);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Run the workflow for an event. Exit code 1 means the run failed.
pub async fn run(config: &CliConfig, args: RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let event = EventDescriptor::parse(&args.event, args.git_ref.as_str())?;
    let path = config.workflow_path(args.file.as_ref());
    let definition = WorkflowDefinition::from_file(&path)?;
    let settings = RunSettings::resolve(&args, &definition, config);

    info!(
        workflow = %definition.name,
        path = %path.display(),
        event = %event,
        max_parallel = settings.max_parallel,
        step_timeout_secs = settings.step_timeout.as_secs(),
        "Loaded workflow"
    );

    let runner = StepRunner::new(
        Arc::new(ShellExecutor::new(settings.shell.clone())),
        RunnerConfig {
            workspace: settings.workspace.clone(),
            default_step_timeout: settings.step_timeout,
        },
    );
    let scheduler = Scheduler::new(
        definition,
        runner,
        SchedulerConfig {
            max_parallel: settings.max_parallel,
        },
    );

    let Some(jobs) = scheduler.plan(&event)? else {
        if settings.output == OutputFormat::Table {
            println!(
                "{} No trigger of \"{}\" matches {}",
                style("i").blue(),
                scheduler.workflow().name,
                event
            );
        }
        return Ok(ExitCode::SUCCESS);
    };

    if args.dry_run {
        render::plan(&jobs, settings.output)?;
        return Ok(ExitCode::SUCCESS);
    }

    if settings.output == OutputFormat::Table {
        println!(
            "{} Running {} for {} ({} jobs, {} at a time)",
            style("▶").cyan(),
            style(&scheduler.workflow().name).bold(),
            style(&event).dim(),
            jobs.len(),
            settings.max_parallel
        );
    }

    let cancel = CancelHandle::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                cancel.cancel();
            }
        }
    });

    let result = scheduler.execute(jobs, &cancel.token()).await;
    interrupt.abort();
    let run = result?;

    render::run_result(&run, settings.output)?;

    Ok(if run.overall_status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let unset = || "(not set)".to_string();

    println!("Current configuration:");
    println!(
        "  workflow: {}",
        config
            .workflow
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(unset)
    );
    println!(
        "  max_parallel: {}",
        config.max_parallel.map(|n| n.to_string()).unwrap_or_else(unset)
    );
    println!(
        "  step_timeout_seconds: {}",
        config
            .step_timeout_seconds
            .map(|n| n.to_string())
            .unwrap_or_else(unset)
    );
    println!("  shell: {}", config.shell.clone().unwrap_or_else(unset));
    println!("  output_format: {}", config.output_format);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }

    Ok(())
}

/// Set configuration.
pub fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::load()?;
    config.set(key, value)?;
    config.save()?;

    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
