//! OpenAPI document aggregated from the handler annotations.

use utoipa::OpenApi;

use super::dto::{BlockDetail, CleanupResponse, HealthResponse, ResetResponse};
use super::handlers::{blocks, markets, network, system, transactions};
use crate::domain::{
    Block, MarketSnapshot, Trade, TradeSide, Transaction, Transfer, Validator, ValidatorStatus,
    Vault,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::store::{StoreStats, SweepReport};

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "chain-explorer-indexer",
        description = "Read API over the time-windowed chain cache: blocks, transactions, validators, vaults, transfers, markets and trades."
    ),
    paths(
        blocks::list_blocks,
        blocks::latest_block,
        blocks::get_block,
        transactions::list_transactions,
        transactions::get_transaction,
        network::list_validators,
        network::get_validator,
        network::list_vaults,
        network::get_vault,
        network::list_transfers,
        markets::list_markets,
        markets::get_market,
        markets::market_trades,
        markets::recent_trades,
        system::health_handler,
        system::stats_handler,
        system::cleanup_handler,
        system::reset_handler,
    ),
    components(schemas(
        Block,
        Transaction,
        Transfer,
        Validator,
        ValidatorStatus,
        Vault,
        Trade,
        TradeSide,
        MarketSnapshot,
        BlockDetail,
        StoreStats,
        SweepReport,
        HealthResponse,
        CleanupResponse,
        ResetResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Blocks", description = "Block reads"),
        (name = "Transactions", description = "Transaction reads"),
        (name = "Network", description = "Validators, vaults and transfers"),
        (name = "Markets", description = "Market snapshots and trades"),
        (name = "System", description = "Health and statistics"),
        (name = "Admin", description = "Retention and reset"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/api/v1/blocks",
            "/api/v1/blocks/{id}",
            "/api/v1/transactions",
            "/api/v1/markets/{symbol}/trades",
            "/api/v1/stats",
            "/health",
            "/admin/cleanup",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
