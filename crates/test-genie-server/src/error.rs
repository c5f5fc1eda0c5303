//! Unified error handling for the API

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use test_genie_core::{ErrorKind, GenieError};

/// API error response body
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Genie(GenieError),
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation
        | ErrorKind::DangerousPromptPattern
        | ErrorKind::BlockedTool
        | ErrorKind::PathTraversal => StatusCode::BAD_REQUEST,
        ErrorKind::ScopeConflict | ErrorKind::DuplicateAgent | ErrorKind::NotRunning => {
            StatusCode::CONFLICT
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, conflicts) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, Vec::new()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg, Vec::new()),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                msg,
                Vec::new(),
            ),
            AppError::Genie(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    tracing::error!("Internal error: {:?}", err);
                }
                (
                    status_for(kind),
                    kind.as_str(),
                    err.to_string(),
                    err.conflicting_agents().to_vec(),
                )
            }
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
                conflicts,
            }),
        )
            .into_response()
    }
}

impl From<GenieError> for AppError {
    fn from(err: GenieError) -> Self {
        AppError::Genie(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Log full error chain for debugging, return sanitized message to client
        tracing::error!("Internal error: {:?}", err);
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Reject ids that are not UUIDs before touching storage
pub fn parse_uuid(id: &str) -> Result<String, AppError> {
    uuid::Uuid::parse_str(id)
        .map(|u| u.to_string())
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}': expected a UUID", id)))
}
