//! REST endpoint handlers organized by resource.

pub mod blocks;
pub mod markets;
pub mod network;
pub mod system;
pub mod transactions;

use axum::Router;

use crate::app_state::ServerState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<ServerState> {
    Router::new()
        .merge(blocks::routes())
        .merge(transactions::routes())
        .merge(network::routes())
        .merge(markets::routes())
        .merge(system::api_routes())
}
