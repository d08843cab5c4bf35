//! Block read handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{BlockDetail, LimitParams, ListResponse};
use crate::app_state::ServerState;
use crate::domain::Block;
use crate::error::{ErrorResponse, ExplorerError};

/// `GET /blocks` — Newest blocks.
#[utoipa::path(
    get,
    path = "/api/v1/blocks",
    tag = "Blocks",
    summary = "List blocks",
    description = "Returns the newest stored blocks, highest timestamp first. Falls back to the whole collection when the recent window holds fewer than `limit` blocks.",
    params(LimitParams),
    responses(
        (status = 200, description = "Block list", body = ListResponse<Block>),
    )
)]
pub async fn list_blocks(
    State(state): State<ServerState>,
    Query(params): Query<LimitParams>,
) -> Json<ListResponse<Block>> {
    Json(ListResponse::from(state.store.blocks(params.effective()).await))
}

/// `GET /blocks/latest` — Highest stored block.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] while the store is empty.
#[utoipa::path(
    get,
    path = "/api/v1/blocks/latest",
    tag = "Blocks",
    summary = "Latest block",
    description = "Returns the block with the highest stored height.",
    responses(
        (status = 200, description = "Latest block", body = Block),
        (status = 404, description = "No blocks stored yet", body = ErrorResponse),
    )
)]
pub async fn latest_block(
    State(state): State<ServerState>,
) -> Result<impl IntoResponse, ExplorerError> {
    let block = state
        .store
        .latest_block()
        .await
        .ok_or_else(|| ExplorerError::not_found("block", "latest"))?;
    Ok(Json(block))
}

/// `GET /blocks/{id}` — Block by height or hash, with its transactions.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] if no block matches.
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{id}",
    tag = "Blocks",
    summary = "Get block",
    description = "Looks up a block by decimal height or by hash and returns it together with the transactions stored at that height.",
    params(("id" = String, Path, description = "Block height or block hash")),
    responses(
        (status = 200, description = "Block with transactions", body = BlockDetail),
        (status = 404, description = "Block not found", body = ErrorResponse),
    )
)]
pub async fn get_block(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ExplorerError> {
    let block = match id.parse::<u64>() {
        Ok(height) => state.store.block(height).await,
        Err(_) => state.store.block_by_hash(&id).await,
    }
    .ok_or_else(|| ExplorerError::not_found("block", &id))?;

    let transactions = state.store.transactions_in_block(block.block_number).await;
    Ok(Json(BlockDetail {
        block,
        transactions,
    }))
}

/// Block routes.
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/blocks", get(list_blocks))
        .route("/blocks/latest", get(latest_block))
        .route("/blocks/{id}", get(get_block))
}
