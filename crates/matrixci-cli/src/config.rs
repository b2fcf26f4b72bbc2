//! CLI configuration management.
//!
//! Settings resolve in order: command-line flags, then the workflow file,
//! then the user configuration file, then built-in defaults.

use crate::commands::{DEFAULT_WORKFLOW, RunArgs};
use matrixci_core::workflow::WorkflowDefinition;
use matrixci_runner::DEFAULT_STEP_TIMEOUT;
use matrixci_scheduler::DEFAULT_MAX_PARALLEL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the user configuration file location.
pub const CONFIG_ENV: &str = "MATRIXCI_CONFIG";

/// User configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Default workflow file.
    #[serde(default)]
    pub workflow: Option<PathBuf>,
    /// Default maximum concurrent jobs.
    #[serde(default)]
    pub max_parallel: Option<usize>,
    /// Default per-step timeout in seconds.
    #[serde(default)]
    pub step_timeout_seconds: Option<u64>,
    /// Shell used to run step commands.
    #[serde(default)]
    pub shell: Option<String>,
    /// Output format.
    #[serde(default)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        })
    }
}

impl CliConfig {
    /// Load configuration from file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| format!("Invalid config file {}: {}", path.display(), e))?;
        config
            .validate()
            .map_err(|e| format!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Reject values `set` would refuse.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel == Some(0) {
            return Err("max_parallel must be positive".to_string());
        }
        if self.step_timeout_seconds == Some(0) {
            return Err("step_timeout_seconds must be positive".to_string());
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dirs = directories::ProjectDirs::from("dev", "matrixci", "matrixci")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "workflow" => self.workflow = Some(PathBuf::from(value)),
            "max_parallel" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid max_parallel: {}", value))?;
                if n == 0 {
                    return Err("max_parallel must be positive".to_string());
                }
                self.max_parallel = Some(n);
            }
            "step_timeout_seconds" => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid step_timeout_seconds: {}", value))?;
                if secs == 0 {
                    return Err("step_timeout_seconds must be positive".to_string());
                }
                self.step_timeout_seconds = Some(secs);
            }
            "shell" => self.shell = Some(value.to_string()),
            "output_format" => {
                self.output_format = match value {
                    "table" => OutputFormat::Table,
                    "json" => OutputFormat::Json,
                    "yaml" => OutputFormat::Yaml,
                    _ => return Err(format!("Invalid output format: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    /// Workflow path from the flag, then the user config, then the default.
    pub fn workflow_path(&self, flag: Option<&PathBuf>) -> PathBuf {
        flag.cloned()
            .or_else(|| self.workflow.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKFLOW))
    }
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub max_parallel: usize,
    pub step_timeout: Duration,
    pub workspace: PathBuf,
    pub shell: String,
    pub output: OutputFormat,
}

impl RunSettings {
    pub fn resolve(args: &RunArgs, workflow: &WorkflowDefinition, config: &CliConfig) -> Self {
        let max_parallel = args
            .max_parallel
            .or(workflow.max_parallel)
            .or(config.max_parallel)
            .unwrap_or(DEFAULT_MAX_PARALLEL)
            .max(1);

        let step_timeout = args
            .step_timeout
            .or(workflow.step_timeout_seconds)
            .or(config.step_timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_STEP_TIMEOUT);

        let workspace = args
            .workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            max_parallel,
            step_timeout,
            workspace,
            shell: config.shell.clone().unwrap_or_else(|| "sh".to_string()),
            output: args.output.unwrap_or(config.output_format),
        }
    }
}
