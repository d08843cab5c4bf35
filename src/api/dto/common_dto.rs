//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of items returned by list endpoints.
pub const DEFAULT_LIMIT: usize = 50;

/// Upper bound on `limit` for list endpoints.
pub const MAX_LIMIT: usize = 500;

/// `limit` query parameter for list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of items (1..=500). Defaults to 50.
    pub limit: Option<usize>,
}

impl LimitParams {
    /// Returns the requested limit clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective(&self) -> usize {
        clamp_limit(self.limit)
    }
}

/// Clamps an optional limit to `1..=MAX_LIMIT`, defaulting to [`DEFAULT_LIMIT`].
#[must_use]
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// List envelope returned by every collection endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListResponse<T> {
    /// Items, newest or highest-ranked first.
    pub data: Vec<T>,
    /// Number of items in `data`.
    pub count: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}
