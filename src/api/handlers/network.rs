//! Validator, vault and transfer read handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{LimitParams, ListResponse, TransferQuery, ValidatorQuery};
use crate::app_state::ServerState;
use crate::domain::{Transfer, Validator, ValidatorStatus, Vault};
use crate::error::{ErrorResponse, ExplorerError};

/// `GET /validators` — Validators by voting power.
///
/// # Errors
///
/// Returns [`ExplorerError::InvalidRequest`] for an unknown `status`.
#[utoipa::path(
    get,
    path = "/api/v1/validators",
    tag = "Network",
    summary = "List validators",
    description = "Returns validators ordered by voting power, optionally restricted to one status.",
    params(ValidatorQuery),
    responses(
        (status = 200, description = "Validator list", body = ListResponse<Validator>),
        (status = 400, description = "Unknown status", body = ErrorResponse),
    )
)]
pub async fn list_validators(
    State(state): State<ServerState>,
    Query(query): Query<ValidatorQuery>,
) -> Result<impl IntoResponse, ExplorerError> {
    let limit = query.effective_limit();
    let validators = match query.status.as_deref() {
        Some(raw) => {
            let status: ValidatorStatus = raw.parse().map_err(ExplorerError::InvalidRequest)?;
            let mut validators = state.store.validators_by_status(status).await;
            validators.truncate(limit);
            validators
        }
        None => state.store.validators(limit).await,
    };
    Ok(Json(ListResponse::from(validators)))
}

/// `GET /validators/{address}` — Validator by address.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] if the address is unknown.
#[utoipa::path(
    get,
    path = "/api/v1/validators/{address}",
    tag = "Network",
    summary = "Get validator",
    params(("address" = String, Path, description = "Validator address")),
    responses(
        (status = 200, description = "Validator", body = Validator),
        (status = 404, description = "Validator not found", body = ErrorResponse),
    )
)]
pub async fn get_validator(
    State(state): State<ServerState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ExplorerError> {
    let validator = state
        .store
        .validator(&address)
        .await
        .ok_or_else(|| ExplorerError::not_found("validator", &address))?;
    Ok(Json(validator))
}

/// `GET /vaults` — Vaults by equity.
#[utoipa::path(
    get,
    path = "/api/v1/vaults",
    tag = "Network",
    summary = "List vaults",
    description = "Returns vaults ordered by total value locked.",
    params(LimitParams),
    responses(
        (status = 200, description = "Vault list", body = ListResponse<Vault>),
    )
)]
pub async fn list_vaults(
    State(state): State<ServerState>,
    Query(params): Query<LimitParams>,
) -> Json<ListResponse<Vault>> {
    Json(ListResponse::from(state.store.vaults(params.effective()).await))
}

/// `GET /vaults/{address}` — Vault by address.
///
/// # Errors
///
/// Returns [`ExplorerError::NotFound`] if the address is unknown.
#[utoipa::path(
    get,
    path = "/api/v1/vaults/{address}",
    tag = "Network",
    summary = "Get vault",
    params(("address" = String, Path, description = "Vault address")),
    responses(
        (status = 200, description = "Vault", body = Vault),
        (status = 404, description = "Vault not found", body = ErrorResponse),
    )
)]
pub async fn get_vault(
    State(state): State<ServerState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ExplorerError> {
    let vault = state
        .store
        .vault(&address)
        .await
        .ok_or_else(|| ExplorerError::not_found("vault", &address))?;
    Ok(Json(vault))
}

/// `GET /transfers` — Newest transfers, optionally for one address.
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    tag = "Network",
    summary = "List transfers",
    description = "Returns the newest transfers. `address` matches either sender or recipient (case-insensitive).",
    params(TransferQuery),
    responses(
        (status = 200, description = "Transfer list", body = ListResponse<Transfer>),
    )
)]
pub async fn list_transfers(
    State(state): State<ServerState>,
    Query(query): Query<TransferQuery>,
) -> Json<ListResponse<Transfer>> {
    let limit = query.effective_limit();
    let transfers = match query.address.as_deref().filter(|a| !a.is_empty()) {
        Some(address) => state.store.transfers_by_address(address, limit).await,
        None => state.store.transfers(limit).await,
    };
    Json(ListResponse::from(transfers))
}

/// Validator, vault and transfer routes.
pub fn routes() -> Router<ServerState> {
    Router::new()
        .route("/validators", get(list_validators))
        .route("/validators/{address}", get(get_validator))
        .route("/vaults", get(list_vaults))
        .route("/vaults/{address}", get(get_vault))
        .route("/transfers", get(list_transfers))
}
