//! Transaction read handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ListResponse, TransactionQuery};
use crate::app_state::ServerState;
use crate::domain::Transaction;
use crate::error::{ErrorResponse, ExplorerError};

/// `GET /transactions` — Newest transactions, optionally filtered.
///
/// With both filters set, the sender's transactions are narrowed to the
/// action tag.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "Transactions",
    summary = "List transactions",
    description = "Returns the newest transactions. `user` filters by sender (case-insensitive) and `action_type` by action tag.",
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transaction list", body = ListResponse<Transaction>),
    )
)]
pub async fn list_transactions(
    State(state): State<ServerState>,
    Query(query): Query<TransactionQuery>,
) -> Json<ListResponse<Transaction>> {
    let limit = query.effective_limit();
    let user = query.user.as_deref().filter(|u| !u.is_empty());
    let action = query.action_type.as_deref().filter(|a| !a.is_empty());

    let txs = match (user, action) {
        (Some(user), Some(action)) => {
            let mut txs = state.store.transactions_by_user(user, usize::MAX).await;
            txs.retain(|tx| tx.action_type == action);
            txs.truncate(limit);
            txs
        }
        (Some(user), None) => state.store.transactions_by_user(user, limit).await,
        (None, Some(action)) => state.store.transactions_by_action_type(action, limit).await,
        (None, None) => state.store.transactions(limit).await,
    };
    Json(ListResponse::from(txs))
}

/// `GET /transactions/{hash}` — Transaction by hash.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] if the hash is unknown.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{hash}",
    tag = "Transactions",
    summary = "Get transaction",
    description = "Returns a single transaction by hash.",
    params(("hash" = String, Path, description = "Transaction hash")),
    responses(
        (status = 200, description = "Transaction", body = Transaction),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
    )
)]
pub async fn get_transaction(
    State(state): State<ServerState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ExplorerError> {
    let tx = state
        .store
        .transaction(&hash)
        .await
        .ok_or_else(|| ExplorerError::not_found("transaction", &hash))?;
    Ok(Json(tx))
}

/// Transaction routes.
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/{hash}", get(get_transaction))
}
