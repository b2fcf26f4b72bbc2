//! Workflow definition types.
//!
//! These types represent the user-authored workflow YAML: trigger rules, the
//! matrix axes, and the step list shared by every expanded job. A definition
//! is loaded once per process and passed by reference to every component.

use crate::events::EventKind;
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
    #[serde(default)]
    pub matrix: Vec<Axis>,
    pub steps: Vec<Step>,
    /// Default timeout applied to steps without their own.
    #[serde(default)]
    pub step_timeout_seconds: Option<u64>,
    /// Upper bound on concurrently executing jobs.
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

/// Condition under which a run is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TriggerRule {
    pub kind: EventKind,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TriggerRule {
    pub fn push(branches: &[&str], tags: &[&str]) -> Self {
        Self {
            kind: EventKind::Push,
            branches: branches.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn pull_request(branches: &[&str]) -> Self {
        Self {
            kind: EventKind::PullRequest,
            branches: branches.iter().map(|s| s.to_string()).collect(),
            tags: vec![],
        }
    }
}

/// A named dimension of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reject axes with no values or repeated values.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidWorkflow("matrix axis name must not be empty".to_string()));
        }
        if self.values.is_empty() {
            return Err(Error::EmptyAxis {
                axis: self.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for value in &self.values {
            if !seen.insert(value.as_str()) {
                return Err(Error::DuplicateAxisValue {
                    axis: self.name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Validate a full axis list: each axis individually, and no repeated names.
pub fn validate_axes(axes: &[Axis]) -> Result<()> {
    let mut names = HashSet::new();
    for axis in axes {
        axis.validate()?;
        if !names.insert(axis.name.as_str()) {
            return Err(Error::DuplicateAxis(axis.name.clone()));
        }
    }
    Ok(())
}

/// A single named unit of work. The command is opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub name: String,
    pub run: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Step {
    pub fn new(name: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run: run.into(),
            timeout_seconds: None,
        }
    }

    /// Set the step's timeout, rounded up to whole seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_seconds = Some(secs);
        self
    }

    /// The step's own timeout, if it declares one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl WorkflowDefinition {
    /// Parse and validate a workflow from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: WorkflowDefinition = serde_yaml::from_str(content)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load and validate a workflow file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidWorkflow("workflow name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(Error::InvalidWorkflow("workflow declares no steps".to_string()));
        }

        let mut step_names = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(Error::InvalidWorkflow("step name must not be empty".to_string()));
            }
            if step.run.trim().is_empty() {
                return Err(Error::InvalidWorkflow(format!(
                    "step '{}' has an empty command",
                    step.name
                )));
            }
            if step.timeout_seconds == Some(0) {
                return Err(Error::InvalidWorkflow(format!(
                    "step '{}' has a zero timeout",
                    step.name
                )));
            }
            if !step_names.insert(step.name.as_str()) {
                return Err(Error::InvalidWorkflow(format!(
                    "step '{}' is declared more than once",
                    step.name
                )));
            }
        }

        if self.step_timeout_seconds == Some(0) {
            return Err(Error::InvalidWorkflow("step_timeout_seconds must be positive".to_string()));
        }
        if self.max_parallel == Some(0) {
            return Err(Error::InvalidWorkflow("max_parallel must be positive".to_string()));
        }

        validate_axes(&self.matrix)
    }

    /// Number of jobs the matrix expands to.
    pub fn job_count(&self) -> usize {
        self.matrix.iter().map(|axis| axis.values.len()).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"
name: ci
triggers:
  - kind: push
    branches: [main]
    tags: ["v*"]
  - kind: pull_request
matrix:
  - name: os
    values: [ubuntu-latest, windows-latest, macos-latest]
  - name: toolchain
    values: [stable, nightly]
steps:
  - name: check-format
    run: cargo fmt -- --check
  - name: run-tests
    run: cargo test
    timeout_seconds: 600
"#;

    #[test]
    fn test_parse_workflow() {
        let def = WorkflowDefinition::from_yaml(WORKFLOW).unwrap();
        assert_eq!(def.name, "ci");
        assert_eq!(def.triggers.len(), 2);
        assert_eq!(def.triggers[1].kind, EventKind::PullRequest);
        assert!(def.triggers[1].branches.is_empty());
        assert_eq!(def.matrix[0].name, "os");
        assert_eq!(def.job_count(), 6);
        assert_eq!(def.steps[1].timeout(), Some(Duration::from_secs(600)));
        assert_eq!(def.steps[0].timeout(), None);
        assert_eq!(def.max_parallel, None);
    }

    #[test]
    fn test_unknown_trigger_kind_rejected() {
        let yaml = r#"
name: ci
triggers:
  - kind: cron
steps:
  - name: a
    run: "true"
"#;
        let err = WorkflowDefinition::from_yaml(yaml).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_axis_rejected() {
        let yaml = r#"
name: ci
matrix:
  - name: os
    values: []
steps:
  - name: a
    run: "true"
"#;
        let err = WorkflowDefinition::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::EmptyAxis { ref axis } if axis == "os"));
    }

    #[test]
    fn test_duplicate_axis_rejected() {
        let axes = vec![Axis::new("os", &["linux"]), Axis::new("os", &["macos"])];
        assert!(matches!(
            validate_axes(&axes),
            Err(Error::DuplicateAxis(ref name)) if name == "os"
        ));
    }

    #[test]
    fn test_duplicate_axis_value_rejected() {
        let axis = Axis::new("toolchain", &["stable", "stable"]);
        assert!(matches!(
            axis.validate(),
            Err(Error::DuplicateAxisValue { .. })
        ));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let def = WorkflowDefinition {
            name: "ci".into(),
            triggers: vec![],
            matrix: vec![],
            steps: vec![Step::new("a", "true"), Step::new("a", "false")],
            step_timeout_seconds: None,
            max_parallel: None,
        };
        assert!(matches!(def.validate(), Err(Error::InvalidWorkflow(_))));
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let step = Step::new("a", "true").with_timeout(Duration::from_millis(250));
        assert_eq!(step.timeout(), Some(Duration::from_secs(1)));
        let step = Step::new("a", "true").with_timeout(Duration::from_millis(2001));
        assert_eq!(step.timeout(), Some(Duration::from_secs(3)));

        let mut def = WorkflowDefinition::from_yaml(WORKFLOW).unwrap();
        def.steps = vec![Step::new("a", "true").with_timeout(Duration::ZERO)];
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_no_steps_rejected() {
        let yaml = "name: ci\nsteps: []\n";
        assert!(WorkflowDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_matrix_is_single_job() {
        let yaml = "name: ci\nsteps:\n  - name: a\n    run: \"true\"\n";
        let def = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.job_count(), 1);
    }
}
