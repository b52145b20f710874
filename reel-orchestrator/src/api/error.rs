//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::engine::EngineError;
use crate::repository::RepositoryError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<reel_core::Error> for ApiError {
    fn from(err: reel_core::Error) -> Self {
        match err {
            reel_core::Error::InvalidUrn(_) | reel_core::Error::Validation(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(err) => ApiError::DatabaseError(err),
            RepositoryError::NotFound(urn) => ApiError::NotFound(format!("Job {} not found", urn)),
            RepositoryError::Duplicate(what) => ApiError::Conflict(format!("{} already exists", what)),
            RepositoryError::Conflict(urn) => {
                ApiError::Conflict(format!("Job {} was modified concurrently", urn))
            }
            RepositoryError::Core(err) => err.into(),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
