//! Explorer error types with HTTP status code mapping.
//!
//! [`ExplorerError`] is the central error type for the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Inside the sync cycle errors are logged and swallowed; only the REST
//! layer ever renders them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "block not found: 123",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | Not Found       | 404 Not Found              |
/// | 3000–3999 | Server          | 500 Internal Server Error  |
/// | 5000–5999 | Upstream        | 502 / 504 / 429            |
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    /// Requested record does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity type name (e.g. `"block"`).
        entity: &'static str,
        /// Natural key that was looked up.
        key: String,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An upstream record is missing a field the store depends on.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Upstream call failed (transport, HTTP status, or decoding).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream call exceeded its time budget.
    #[error("upstream timed out after {timeout_ms} ms")]
    UpstreamTimeout {
        /// Budget that was exceeded.
        timeout_ms: u64,
    },

    /// Upstream rejected the call for rate limiting.
    #[error("upstream rate limited")]
    RateLimited,

    /// Writing or reading the persisted state failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExplorerError {
    /// Shorthand for [`ExplorerError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns `true` for failures worth retrying on the next cycle.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::UpstreamTimeout { .. } | Self::RateLimited
        )
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidRecord(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::Io(_) => 3003,
            Self::Upstream(_) => 5001,
            Self::UpstreamTimeout { .. } => 5002,
            Self::RateLimited => 5003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Persistence(_) | Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ExplorerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
