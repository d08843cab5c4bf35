//! System endpoints: health check, stats, admin.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{CleanupQuery, CleanupResponse, HealthResponse, ResetResponse};
use crate::app_state::ServerState;
use crate::store::StoreStats;

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the highest stored block height.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let latest_block_height = state.store.latest_tip().await.map(|(height, _)| height);
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            latest_block_height,
            ws_subscribers: state.event_bus.receiver_count(),
        }),
    )
}

/// `GET /api/v1/stats` — Aggregate store statistics.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "System",
    summary = "Store statistics",
    description = "Returns per-type totals, the latest block, recent transaction count and the average block interval.",
    responses(
        (status = 200, description = "Store statistics", body = StoreStats),
    )
)]
pub async fn stats_handler(State(state): State<ServerState>) -> Json<StoreStats> {
    Json(state.store.stats().await)
}

/// `POST /admin/cleanup` — Remove records older than `hours`.
#[utoipa::path(
    post,
    path = "/admin/cleanup",
    tag = "Admin",
    summary = "Remove old records",
    description = "Evicts every record older than `hours` from every collection, rebuilds the indexes and schedules a snapshot write.",
    params(CleanupQuery),
    responses(
        (status = 200, description = "Records removed", body = CleanupResponse),
    )
)]
pub async fn cleanup_handler(
    State(state): State<ServerState>,
    Query(query): Query<CleanupQuery>,
) -> Json<CleanupResponse> {
    let removed = state.retention.clear_old_data(query.hours).await;
    Json(CleanupResponse {
        hours: query.hours,
        total_removed: removed.total(),
        removed,
    })
}

/// `POST /admin/reset` — Drop every record.
#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "Admin",
    summary = "Reset the store",
    description = "Empties every collection, restarts id counters and writes the empty state immediately.",
    responses(
        (status = 200, description = "Store reset", body = ResetResponse),
    )
)]
pub async fn reset_handler(State(state): State<ServerState>) -> Json<ResetResponse> {
    state.retention.clear_all_data().await;
    Json(ResetResponse {
        status: "reset".to_string(),
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin/cleanup", post(cleanup_handler))
        .route("/admin/reset", post(reset_handler))
}

/// System routes mounted under `/api/v1`.
pub fn api_routes() -> Router<ServerState> {
    Router::new().route("/stats", get(stats_handler))
}
