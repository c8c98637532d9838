//! Error types for the memoization cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache instances, persistence and the admin surface.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid option combination, raised when an instance is constructed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The user-supplied compute function failed
    #[error("Compute failed: {0}")]
    Compute(Arc<anyhow::Error>),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Named cache or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading, writing or encoding the persisted file failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps a compute failure so it can be shared between waiters.
    pub fn compute(err: anyhow::Error) -> Self {
        CacheError::Compute(Arc::new(err))
    }

    pub(crate) fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        CacheError::Persistence(format!("{}: {}", context, err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Compute(_) => StatusCode::BAD_GATEWAY,
            CacheError::Config(_) | CacheError::Persistence(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
