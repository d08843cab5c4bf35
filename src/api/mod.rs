//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and admin routes
//! live at the root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::ServerState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<ServerState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());
    with_docs(router)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<ServerState>) -> Router<ServerState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    router.merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<ServerState>) -> Router<ServerState> {
    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::{Block, Clock, EventBus, ManualClock, Transaction};
    use crate::service::explorer_store::tests::facade;
    use crate::service::{ExplorerStore, RetentionManager};

    const NOW: i64 = 1_700_000_000;

    fn app() -> (Router, ExplorerStore) {
        let (store, _) = facade();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let state = ServerState::new(
            store.clone(),
            RetentionManager::new(store.clone(), clock),
            EventBus::new(16),
        );
        (build_router().with_state(state), store)
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let response = match app.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should read");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn seed(store: &ExplorerStore) {
        for (height, hash, ts) in [(10, "0xb10", NOW - 30), (11, "0xb11", NOW - 20)] {
            let Ok(_) = store.upsert_block(Block::new(height, hash, ts)).await else {
                panic!("block should store");
            };
        }
        let tx = Transaction::new("0xt1", 11, NOW - 20, "0xAlice", "order");
        let Ok(_) = store.upsert_transaction(tx).await else {
            panic!("transaction should store");
        };
        let old = Block::new(3, "0xb3", NOW - 10 * 3_600);
        let Ok(_) = store.upsert_block(old).await else {
            panic!("block should store");
        };
    }

    #[tokio::test]
    async fn health_reports_latest_height() {
        let (app, store) = app();
        seed(&store).await;
        let (status, body) = call(app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&serde_json::json!("healthy")));
        assert_eq!(body.get("latest_block_height"), Some(&serde_json::json!(11)));
    }

    #[tokio::test]
    async fn lists_blocks_with_count() {
        let (app, store) = app();
        seed(&store).await;
        let (status, body) = call(app, Method::GET, "/api/v1/blocks?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("count"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn block_lookup_by_height_and_hash() {
        let (app, store) = app();
        seed(&store).await;
        let (status, body) = call(app.clone(), Method::GET, "/api/v1/blocks/11").await;
        assert_eq!(status, StatusCode::OK);
        let Some(txs) = body.get("transactions").and_then(|t| t.as_array()) else {
            panic!("detail should carry transactions");
        };
        assert_eq!(txs.len(), 1);

        let (status, _) = call(app.clone(), Method::GET, "/api/v1/blocks/0xb10").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app, Method::GET, "/api/v1/blocks/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn latest_block_is_404_when_empty() {
        let (app, _) = app();
        let (status, _) = call(app, Method::GET, "/api/v1/blocks/latest").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transactions_filter_by_user_case_insensitively() {
        let (app, store) = app();
        seed(&store).await;
        let (_, body) = call(app.clone(), Method::GET, "/api/v1/transactions?user=0xalice").await;
        assert_eq!(body.get("count"), Some(&serde_json::json!(1)));

        let (_, body) = call(
            app,
            Method::GET,
            "/api/v1/transactions?user=0xalice&action_type=cancel",
        )
        .await;
        assert_eq!(body.get("count"), Some(&serde_json::json!(0)));
    }

    #[tokio::test]
    async fn unknown_validator_status_is_400() {
        let (app, _) = app();
        let (status, _) = call(app, Method::GET, "/api/v1/validators?status=sleepy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cleanup_removes_old_blocks() {
        let (app, store) = app();
        seed(&store).await;
        let (status, body) = call(app, Method::POST, "/admin/cleanup?hours=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("total_removed"), Some(&serde_json::json!(1)));
        assert!(store.block(3).await.is_none());
        assert!(store.block(11).await.is_some());
    }

    #[tokio::test]
    async fn reset_empties_the_store() {
        let (app, store) = app();
        seed(&store).await;
        let (status, _) = call(app.clone(), Method::POST, "/admin/reset").await;
        assert_eq!(status, StatusCode::OK);
        let (_, stats) = call(app, Method::GET, "/api/v1/stats").await;
        assert_eq!(stats.get("total_blocks"), Some(&serde_json::json!(0)));
        assert!(store.latest_block().await.is_none());
    }
}
