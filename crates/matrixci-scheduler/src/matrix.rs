//! Matrix expansion for parallel job generation.

use matrixci_core::Result;
use matrixci_core::ids::JobId;
use matrixci_core::run::{JobSpec, MatrixValue};
use matrixci_core::workflow::{Axis, Step, validate_axes};

/// Expander for matrix configurations.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand the axes into one job per combination, each carrying `steps`.
    ///
    /// Jobs come out in axis declaration order with the last axis varying
    /// fastest, so repeated expansions of the same input line up index for
    /// index. No axes yields a single job with an empty assignment.
    pub fn expand(&self, workflow: &str, axes: &[Axis], steps: &[Step]) -> Result<Vec<JobSpec>> {
        validate_axes(axes)?;

        let jobs = self
            .generate_combinations(axes)
            .into_iter()
            .enumerate()
            .map(|(index, assignment)| JobSpec {
                id: JobId::new(),
                index,
                workflow: workflow.to_string(),
                assignment,
                steps: steps.to_vec(),
            })
            .collect();

        Ok(jobs)
    }

    fn generate_combinations(&self, axes: &[Axis]) -> Vec<Vec<MatrixValue>> {
        let mut result: Vec<Vec<MatrixValue>> = vec![Vec::new()];

        for axis in axes {
            let mut new_result = Vec::with_capacity(result.len() * axis.values.len());

            for combo in &result {
                for value in &axis.values {
                    let mut new_combo = combo.clone();
                    new_combo.push(MatrixValue {
                        axis: axis.name.clone(),
                        value: value.clone(),
                    });
                    new_result.push(new_combo);
                }
            }

            result = new_result;
        }

        result
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}
