//! Shared application state injected into all Axum handlers.

use crate::domain::EventBus;
use crate::service::{ExplorerStore, RetentionManager};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Built once by the composition root in `main.rs`.
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Store-facing read/write interface.
    pub store: ExplorerStore,
    /// Cleanup and reset operations.
    pub retention: RetentionManager,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl ServerState {
    /// Bundles the shared services.
    #[must_use]
    pub fn new(store: ExplorerStore, retention: RetentionManager, event_bus: EventBus) -> Self {
        Self {
            store,
            retention,
            event_bus,
        }
    }
}
