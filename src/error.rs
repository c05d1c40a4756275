//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for stores, the wrap engine and the HTTP surface.
///
/// The enum is `Clone` because the outcome of a single deduplicated
/// computation is handed to every caller that joined it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Attempted to store the absent sentinel (`null`)
    #[error("Value for key '{key}' is not cacheable")]
    NotCacheable { key: String },

    /// A computed TTL function failed
    #[error("Failed to resolve TTL for key '{key}': {reason}")]
    TtlResolution {
        key: String,
        reason: Arc<anyhow::Error>,
    },

    /// The wrapped computation failed
    #[error("Computation failed: {0}")]
    Computation(Arc<anyhow::Error>),

    /// The wrapped computation did not settle before the configured deadline
    #[error("Computation for key '{key}' timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    /// The computation task went away without producing an outcome
    #[error("Computation for key '{key}' was interrupted")]
    Interrupted { key: String },

    /// Key rejected by the store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(Arc<anyhow::Error>),
}

impl CacheError {
    /// Wraps a user computation error.
    pub fn computation(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Computation(Arc::new(err.into()))
    }

    /// Wraps a backing store failure.
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Store(Arc::new(err.into()))
    }

    pub fn not_cacheable(key: impl Into<String>) -> Self {
        CacheError::NotCacheable { key: key.into() }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotCacheable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::InvalidKey(_) | CacheError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::TtlResolution { .. }
            | CacheError::Computation(_)
            | CacheError::Interrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
