use thiserror::Error;

use crate::error::GenieError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("execution is required")]
    MissingExecution,

    #[error("workflow is required")]
    MissingWorkflow,

    #[error("timeline is required")]
    MissingTimeline,

    #[error("timeline has no frames")]
    EmptyTimeline,

    #[error("execution_id is required")]
    MissingExecutionId,

    #[error("execution id mismatch: expected {expected}, got {actual}")]
    ExecutionIdMismatch { expected: String, actual: String },

    #[error("workflow id mismatch: expected {expected}, got {actual}")]
    WorkflowIdMismatch { expected: String, actual: String },
}

pub type ReplayResult<T> = std::result::Result<T, ReplayError>;

impl From<ReplayError> for GenieError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::ExecutionIdMismatch { expected, actual } => {
                GenieError::ExecutionIdMismatch { expected, actual }
            }
            ReplayError::WorkflowIdMismatch { expected, actual } => {
                GenieError::WorkflowIdMismatch { expected, actual }
            }
            other => GenieError::Validation(other.to_string()),
        }
    }
}
