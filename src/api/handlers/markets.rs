//! Market snapshot and trade read handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{LimitParams, ListResponse};
use crate::app_state::ServerState;
use crate::domain::{MarketSnapshot, Trade};
use crate::error::{ErrorResponse, ExplorerError};

/// `GET /markets` — Market snapshots by 24 h volume.
#[utoipa::path(
    get,
    path = "/api/v1/markets",
    tag = "Markets",
    summary = "List markets",
    description = "Returns every market snapshot ordered by 24 h notional volume.",
    responses(
        (status = 200, description = "Market list", body = ListResponse<MarketSnapshot>),
    )
)]
pub async fn list_markets(State(state): State<ServerState>) -> Json<ListResponse<MarketSnapshot>> {
    Json(ListResponse::from(state.store.markets().await))
}

/// `GET /markets/{symbol}` — Snapshot for one market.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] for an unknown symbol.
#[utoipa::path(
    get,
    path = "/api/v1/markets/{symbol}",
    tag = "Markets",
    summary = "Get market",
    params(("symbol" = String, Path, description = "Market symbol, e.g. BTC")),
    responses(
        (status = 200, description = "Market snapshot", body = MarketSnapshot),
        (status = 404, description = "Market not found", body = ErrorResponse),
    )
)]
pub async fn get_market(
    State(state): State<ServerState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ExplorerError> {
    let market = state
        .store
        .market(&symbol)
        .await
        .ok_or_else(|| ExplorerError::not_found("market", &symbol))?;
    Ok(Json(market))
}

/// `GET /markets/{symbol}/trades` — Newest trades for one market.
#[utoipa::path(
    get,
    path = "/api/v1/markets/{symbol}/trades",
    tag = "Markets",
    summary = "List trades for a market",
    params(
        ("symbol" = String, Path, description = "Market symbol, e.g. BTC"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Trade list", body = ListResponse<Trade>),
    )
)]
pub async fn market_trades(
    State(state): State<ServerState>,
    Path(symbol): Path<String>,
    Query(params): Query<LimitParams>,
) -> Json<ListResponse<Trade>> {
    Json(ListResponse::from(
        state.store.trades_by_symbol(&symbol, params.effective()).await,
    ))
}

/// `GET /trades` — Newest trades across every market.
#[utoipa::path(
    get,
    path = "/api/v1/trades",
    tag = "Markets",
    summary = "List recent trades",
    params(LimitParams),
    responses(
        (status = 200, description = "Trade list", body = ListResponse<Trade>),
    )
)]
pub async fn recent_trades(
    State(state): State<ServerState>,
    Query(params): Query<LimitParams>,
) -> Json<ListResponse<Trade>> {
    Json(ListResponse::from(
        state.store.recent_trades(params.effective()).await,
    ))
}

/// Market and trade routes.
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/markets", get(list_markets))
        .route("/markets/{symbol}", get(get_market))
        .route("/markets/{symbol}/trades", get(market_trades))
        .route("/trades", get(recent_trades))
}
