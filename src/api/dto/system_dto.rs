//! Health and admin response DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::store::SweepReport;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    pub status: String,
    /// Server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Highest stored block height, if any.
    pub latest_block_height: Option<u64>,
    /// Connected WebSocket subscribers.
    pub ws_subscribers: usize,
}

/// Response of `POST /admin/cleanup`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    /// Age threshold that was applied.
    pub hours: u64,
    /// Records removed per collection.
    pub removed: SweepReport,
    /// Sum of `removed`.
    pub total_removed: usize,
}

/// Response of `POST /admin/reset`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    /// Always `"reset"`.
    pub status: String,
}
