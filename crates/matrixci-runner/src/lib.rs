//! Step execution engine for matrixci.

pub mod cancel;
pub mod fakes;
pub mod job;
pub mod runner;
pub mod shell;

pub use cancel::{CancelHandle, CancelToken};
pub use job::StepRunner;
pub use runner::{
    DEFAULT_STEP_TIMEOUT, RunnerConfig, StepContext, StepExecutor, StepOutcome, job_environment,
};
pub use shell::ShellExecutor;
