//! Trigger matching, matrix expansion and run orchestration for matrixci.

pub mod aggregate;
pub mod matrix;
pub mod scheduler;
pub mod triggers;

pub use aggregate::{RunAggregator, overall_status};
pub use matrix::MatrixExpander;
pub use scheduler::{DEFAULT_MAX_PARALLEL, Scheduler, SchedulerConfig};
pub use triggers::TriggerMatcher;
