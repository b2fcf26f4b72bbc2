//! CLI command definitions.

use crate::config::OutputFormat;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Workflow file used when none is given.
pub const DEFAULT_WORKFLOW: &str = "matrixci.yaml";

const RUN_EXIT_STATUS: &str = "Exit status:
  0  the run succeeded, or no trigger matched the event (nothing ran)
  1  the run failed: a job failed, timed out or was cancelled
  2  invalid workflow, invocation or configuration; nothing ran";

#[derive(Subcommand)]
pub enum Commands {
    /// Write a template workflow file
    Init {
        /// Path to create
        #[arg(default_value = DEFAULT_WORKFLOW)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow file
        #[arg(default_value = DEFAULT_WORKFLOW)]
        path: PathBuf,
    },

    /// Run the workflow for an event
    #[command(after_help = RUN_EXIT_STATUS)]
    Run(RunArgs),

    /// Print the JSON schema of the workflow file
    Schema,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Event kind: push or pull_request
    pub event: String,

    /// Branch or tag for a push, target branch for a pull request
    #[arg(value_name = "REF")]
    pub git_ref: String,

    /// Path to workflow file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Print the expanded jobs without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of jobs running at once
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Default per-step timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub step_timeout: Option<u64>,

    /// Directory the steps run in
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
