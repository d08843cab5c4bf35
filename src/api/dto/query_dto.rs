//! Filter query parameters for the transaction, transfer and validator
//! list endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use super::common_dto::clamp_limit;

/// Query parameters for `GET /transactions`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    /// Only transactions sent by this address (case-insensitive).
    pub user: Option<String>,
    /// Only transactions with this action tag (e.g. `order`).
    pub action_type: Option<String>,
    /// Maximum number of items (1..=500). Defaults to 50.
    pub limit: Option<usize>,
}

impl TransactionQuery {
    /// Clamped limit.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit)
    }
}

/// Query parameters for `GET /transfers`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferQuery {
    /// Only transfers where this address is sender or recipient.
    pub address: Option<String>,
    /// Maximum number of items (1..=500). Defaults to 50.
    pub limit: Option<usize>,
}

impl TransferQuery {
    /// Clamped limit.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit)
    }
}

/// Query parameters for `GET /validators`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ValidatorQuery {
    /// Only validators in this status (`active`, `inactive`, `jailed`).
    pub status: Option<String>,
    /// Maximum number of items (1..=500). Defaults to 50.
    pub limit: Option<usize>,
}

impl ValidatorQuery {
    /// Clamped limit.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit)
    }
}

/// Query parameters for `POST /admin/cleanup`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CleanupQuery {
    /// Remove records older than this many hours. Defaults to 24.
    #[serde(default = "default_cleanup_hours")]
    pub hours: u64,
}

fn default_cleanup_hours() -> u64 {
    24
}
