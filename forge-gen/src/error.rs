//! API error types
//!
//! Maps the shared error taxonomy onto HTTP responses with a JSON error
//! envelope. Handlers return `ApiResult` and rely on the `From`
//! conversions.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - duplicate in-flight generation for one parent
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream provider failure (502)
    #[error("Provider failure: {0}")]
    UpstreamFailure(String),

    /// Bounded operation timed out (504)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Generation failed after the asset entered processing (500)
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<forge_common::Error> for ApiError {
    fn from(err: forge_common::Error) -> Self {
        use forge_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Provider(msg) => ApiError::UpstreamFailure(msg),
            Error::Timeout(msg) => ApiError::Timeout(msg),
            Error::Generation(msg) => ApiError::GenerationFailed(msg),
            Error::Database(e) => ApiError::Internal(format!("database error: {e}")),
            Error::Io(e) => ApiError::Internal(format!("io error: {e}")),
            Error::Config(msg) | Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::UpstreamFailure(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg),
            ApiError::GenerationFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_FAILED", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
