//! Error types for flipfix-web

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flipfix_common::links::LinkValidationError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or unknown maintainer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Text contains unresolvable links (400, reported as a form error)
    #[error(transparent)]
    Validation(LinkValidationError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<flipfix_common::Error> for ApiError {
    fn from(err: flipfix_common::Error) -> Self {
        use flipfix_common::Error;

        match err {
            Error::LinkValidation(validation) => ApiError::Validation(validation),
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => {
                error!("Request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        flipfix_common::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body("NOT_FOUND", &msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body("BAD_REQUEST", &msg)),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, error_body("UNAUTHORIZED", &msg))
            }
            ApiError::Validation(validation) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": {
                        "code": "VALIDATION_ERROR",
                        "field": "text",
                        "message": validation.to_string(),
                        "broken": validation.broken,
                    }
                }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("INTERNAL_ERROR", &msg),
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(code: &str, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
