//! chain-explorer-indexer server entry point.
//!
//! Restores the persisted store, starts the sync scheduler and serves the
//! REST and WebSocket endpoints until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tokio::sync::{RwLock, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use chain_explorer_indexer::api;
use chain_explorer_indexer::app_state::ServerState;
use chain_explorer_indexer::config::ExplorerConfig;
use chain_explorer_indexer::domain::{Clock, EventBus, SystemClock};
use chain_explorer_indexer::persistence::{JsonFileSink, PersistenceWriter, SnapshotSink};
use chain_explorer_indexer::service::{ExplorerStore, RetentionManager};
use chain_explorer_indexer::store::IndexedStore;
use chain_explorer_indexer::sync::{SyncCycle, SyncSources, run_scheduler};
use chain_explorer_indexer::upstream::{ActivitySource, HeightSource, HttpUpstream};
use chain_explorer_indexer::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ExplorerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, "starting chain-explorer-indexer");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Restore persisted state
    let sink = Arc::new(JsonFileSink::new(&config.data_file));
    let store = match sink.load().await {
        Ok(Some(state)) => {
            let store =
                IndexedStore::from_persisted(state, Arc::clone(&clock), config.recent_window());
            tracing::info!(
                path = %config.data_file.display(),
                blocks = store.stats().total_blocks,
                "restored persisted state"
            );
            store
        }
        Ok(None) => IndexedStore::new(Arc::clone(&clock), config.recent_window()),
        Err(e) => {
            tracing::warn!(
                path = %config.data_file.display(),
                error = %e,
                "persisted state unreadable, starting empty"
            );
            IndexedStore::new(Arc::clone(&clock), config.recent_window())
        }
    };
    let shared = Arc::new(RwLock::new(store));

    // Build service layer
    let writer = PersistenceWriter::spawn(
        Arc::clone(&shared),
        sink as Arc<dyn SnapshotSink>,
        config.persist_debounce(),
    );
    let explorer_store = ExplorerStore::new(shared, writer.clone());
    let retention = RetentionManager::new(explorer_store.clone(), Arc::clone(&clock));
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build sync layer
    let upstream = Arc::new(
        HttpUpstream::new(
            config.explorer_api_url.clone(),
            config.info_api_url.clone(),
            config.upstream_timeout(),
            Arc::clone(&clock),
        )
        .context("building upstream client")?,
    );
    let cycle = SyncCycle::new(
        explorer_store.clone(),
        retention.clone(),
        SyncSources {
            heights: Arc::clone(&upstream) as Arc<dyn HeightSource>,
            activity: upstream as Arc<dyn ActivitySource>,
        },
        event_bus.clone(),
        clock,
        config.ingest_window(),
        config.sync_config(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_scheduler(cycle, config.sync_interval(), shutdown_rx));

    // Build router
    let app_state = ServerState::new(explorer_store, retention, event_bus);
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    // Drain: finish the in-flight cycle, then write the final snapshot
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "sync scheduler task failed");
    }
    writer.close().await;
    tracing::info!("shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
