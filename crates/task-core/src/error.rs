//! Error types for task runners and vision task APIs

use std::fmt;
use thiserror::Error;

/// Task-level status code attached to a failure, so callers can tell apart
/// failures sharing the same broad category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskErrorCode {
    /// Generic invalid argument (e.g. bad classifier options)
    InvalidArgumentError,

    /// The task graph config (or callback/mode pairing) is not usable
    InvalidTaskGraphConfigError,

    /// Input data the runner cannot accept (GPU frames, unknown streams)
    RunnerUnexpectedInputError,

    /// Input timestamps are not strictly increasing
    RunnerInvalidTimestampError,

    /// A dispatch call does not match the configured running mode
    RunnerApiCalledInWrongModeError,

    /// The runner has not been started or is already closed
    RunnerNotStartedError,

    /// The runner failed to shut down cleanly
    RunnerFailedToCloseError,
}

impl fmt::Display for TaskErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskErrorCode::InvalidArgumentError => "InvalidArgumentError",
            TaskErrorCode::InvalidTaskGraphConfigError => "InvalidTaskGraphConfigError",
            TaskErrorCode::RunnerUnexpectedInputError => "RunnerUnexpectedInputError",
            TaskErrorCode::RunnerInvalidTimestampError => "RunnerInvalidTimestampError",
            TaskErrorCode::RunnerApiCalledInWrongModeError => "RunnerApiCalledInWrongModeError",
            TaskErrorCode::RunnerNotStartedError => "RunnerNotStartedError",
            TaskErrorCode::RunnerFailedToCloseError => "RunnerFailedToCloseError",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid argument ({code}): {message}")]
    InvalidArgument { code: TaskErrorCode, message: String },

    #[error("Failed precondition ({code}): {message}")]
    FailedPrecondition { code: TaskErrorCode, message: String },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TaskError {
    pub fn invalid_argument(code: TaskErrorCode, message: impl Into<String>) -> Self {
        TaskError::InvalidArgument {
            code,
            message: message.into(),
        }
    }

    pub fn failed_precondition(code: TaskErrorCode, message: impl Into<String>) -> Self {
        TaskError::FailedPrecondition {
            code,
            message: message.into(),
        }
    }

    /// The task status code, if this failure carries one
    pub fn code(&self) -> Option<TaskErrorCode> {
        match self {
            TaskError::InvalidArgument { code, .. } | TaskError::FailedPrecondition { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }
}

/// Result type for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_accessor() {
        let err = TaskError::invalid_argument(
            TaskErrorCode::RunnerUnexpectedInputError,
            "GPU input images are currently not supported.",
        );
        assert_eq!(err.code(), Some(TaskErrorCode::RunnerUnexpectedInputError));
        assert!(err.to_string().contains("RunnerUnexpectedInputError"));

        let err = TaskError::EngineFailure("boom".to_string());
        assert_eq!(err.code(), None);
    }
}
