//! Error types for matrixci.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Matrix axis '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("Matrix axis '{0}' is declared more than once")]
    DuplicateAxis(String),

    #[error("Matrix axis '{axis}' lists value '{value}' more than once")]
    DuplicateAxisValue { axis: String, value: String },

    #[error("Unsupported event kind: {0} (expected push or pull_request)")]
    UnsupportedEventKind(String),

    #[error("Invalid workflow definition: {0}")]
    InvalidWorkflow(String),

    // Orchestration errors
    #[error("Aggregation inconsistency: {0}")]
    AggregationInconsistency(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error was caused by the workflow or invocation rather
    /// than by the orchestrator itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::EmptyAxis { .. }
                | Error::DuplicateAxis(_)
                | Error::DuplicateAxisValue { .. }
                | Error::UnsupportedEventKind(_)
                | Error::InvalidWorkflow(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::InvalidWorkflow(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(Error::EmptyAxis { axis: "os".into() }.is_configuration());
        assert!(Error::UnsupportedEventKind("cron".into()).is_configuration());
        assert!(!Error::AggregationInconsistency("missing".into()).is_configuration());
        assert!(!Error::Internal("boom".into()).is_configuration());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::DuplicateAxisValue {
            axis: "os".into(),
            value: "linux".into(),
        };
        assert_eq!(
            err.to_string(),
            "Matrix axis 'os' lists value 'linux' more than once"
        );
    }
}
