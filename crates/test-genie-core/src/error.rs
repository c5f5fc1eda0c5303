//! Error taxonomy shared by every control-plane component

use serde::Serialize;
use thiserror::Error;

pub type GenieResult<T> = std::result::Result<T, GenieError>;

/// Coarse error classification used for HTTP status mapping and event payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    ScopeConflict,
    DuplicateAgent,
    DangerousPromptPattern,
    BlockedTool,
    PathTraversal,
    NotFound,
    NotRunning,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::ScopeConflict => "SCOPE_CONFLICT",
            ErrorKind::DuplicateAgent => "DUPLICATE_AGENT",
            ErrorKind::DangerousPromptPattern => "DANGEROUS_PROMPT_PATTERN",
            ErrorKind::BlockedTool => "BLOCKED_TOOL",
            ErrorKind::PathTraversal => "PATH_TRAVERSAL",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NotRunning => "NOT_RUNNING",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("{0}")]
    Validation(String),

    #[error("scope conflicts with running agents: {}", agent_ids.join(", "))]
    ScopeConflict { agent_ids: Vec<String> },

    #[error("agent {existing_id} is already running the same prompt in scenario {scenario}")]
    DuplicateAgent {
        scenario: String,
        existing_id: String,
    },

    #[error("prompt matches blocked pattern '{rule}'")]
    DangerousPromptPattern { rule: String },

    #[error("tool '{tool}' is not allowed: {reason}")]
    BlockedTool { tool: String, reason: String },

    #[error("path '{path}' escapes the scenario directory")]
    PathTraversal { path: String },

    #[error("{0}")]
    NotFound(String),

    #[error("agent {0} is not running")]
    NotRunning(String),

    #[error("{0}")]
    Timeout(String),

    #[error("no phases selected for execution")]
    NoPhasesSelected,

    #[error("suite request {0} not found")]
    SuiteRequestNotFound(String),

    #[error("execution id mismatch: expected {expected}, got {actual}")]
    ExecutionIdMismatch { expected: String, actual: String },

    #[error("workflow id mismatch: expected {expected}, got {actual}")]
    WorkflowIdMismatch { expected: String, actual: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GenieError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GenieError::Validation(msg.into())
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        GenieError::Internal(anyhow::anyhow!("{}", msg))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GenieError::Validation(_)
            | GenieError::NoPhasesSelected
            | GenieError::ExecutionIdMismatch { .. }
            | GenieError::WorkflowIdMismatch { .. } => ErrorKind::Validation,
            GenieError::ScopeConflict { .. } => ErrorKind::ScopeConflict,
            GenieError::DuplicateAgent { .. } => ErrorKind::DuplicateAgent,
            GenieError::DangerousPromptPattern { .. } => ErrorKind::DangerousPromptPattern,
            GenieError::BlockedTool { .. } => ErrorKind::BlockedTool,
            GenieError::PathTraversal { .. } => ErrorKind::PathTraversal,
            GenieError::NotFound(_) | GenieError::SuiteRequestNotFound(_) => ErrorKind::NotFound,
            GenieError::NotRunning(_) => ErrorKind::NotRunning,
            GenieError::Timeout(_) => ErrorKind::Timeout,
            GenieError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Agent ids cited by a scope conflict, empty for every other kind
    pub fn conflicting_agents(&self) -> &[String] {
        match self {
            GenieError::ScopeConflict { agent_ids } => agent_ids,
            _ => &[],
        }
    }
}
