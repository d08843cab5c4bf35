//! Upstream ports: the two remote data sources the sync cycle pulls from.
//!
//! [`HeightSource`] serves blocks by height and distinguishes "not yet
//! produced" and "pruned" from real failures. [`ActivitySource`] serves the
//! flat recent-activity feed plus network and market metadata. Both are
//! traits so the sync cycle can be driven by in-memory fakes in tests;
//! [`http::HttpUpstream`] implements both against the JSON API.

pub mod http;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Block, Payload, Trade, Transaction, Transfer, Validator, Vault};
use crate::error::ExplorerError;

pub use http::HttpUpstream;

/// A block together with the transactions it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockWithTxs {
    /// Block header.
    pub block: Block,
    /// Contained transactions, in block order.
    pub transactions: Vec<Transaction>,
}

impl BlockWithTxs {
    /// `true` if the block carries the height it was requested at.
    #[must_use]
    pub const fn is_at(&self, height: u64) -> bool {
        self.block.block_number == height
    }
}

/// Result of asking a [`HeightSource`] for one height.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockFetch {
    /// The block exists and was decoded.
    Found(Box<BlockWithTxs>),
    /// The height has not been produced yet.
    Unavailable,
    /// The height is older than the source retains.
    Archived,
}

/// One entry of the flat recent-activity feed. Carries the height of its
/// containing block but never the block hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    /// Transaction hash.
    pub hash: String,
    /// Containing block height.
    pub block_number: u64,
    /// Raw timestamp (seconds or milliseconds).
    pub timestamp: i64,
    /// Sender address.
    pub user: String,
    /// Action tag.
    pub action_type: String,
    /// Action body.
    pub action_data: Payload,
    /// Rejection message, if any.
    pub error: Option<String>,
}

impl ActivityRecord {
    /// Converts into an unlinked [`Transaction`].
    #[must_use]
    pub fn into_transaction(self) -> Transaction {
        let mut tx = Transaction::new(
            self.hash,
            self.block_number,
            self.timestamp,
            self.user,
            self.action_type,
        );
        tx.action_data = self.action_data;
        tx.error = self.error;
        tx
    }
}

/// Per-market metadata used to build snapshots and rank symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDescriptor {
    /// Market symbol (e.g. `"BTC"`).
    pub symbol: String,
    /// Notional volume over the last 24 h.
    pub volume_24h: f64,
    /// Price 24 h ago, used for the change percentage.
    pub prev_day_price: f64,
}

/// Block source indexed by height.
#[async_trait]
pub trait HeightSource: Send + Sync + std::fmt::Debug {
    /// Fetches the block at `height`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    /// Not-yet-produced and pruned heights are [`BlockFetch`] variants.
    async fn fetch_block(&self, height: u64) -> Result<BlockFetch, ExplorerError>;
}

/// Source of recent activity, network state and market data.
///
/// Only the activity feed is mandatory; the remaining feeds default to
/// empty so partial sources stay usable.
#[async_trait]
pub trait ActivitySource: Send + Sync + std::fmt::Debug {
    /// Fetches the flat recent-activity feed.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_recent_activity(&self) -> Result<Vec<ActivityRecord>, ExplorerError>;

    /// Fetches the current validator set.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_validators(&self) -> Result<Vec<Validator>, ExplorerError> {
        Ok(Vec::new())
    }

    /// Fetches vault summaries.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_vaults(&self) -> Result<Vec<Vault>, ExplorerError> {
        Ok(Vec::new())
    }

    /// Fetches recent transfers.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_transfers(&self) -> Result<Vec<Transfer>, ExplorerError> {
        Ok(Vec::new())
    }

    /// Fetches per-market metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_market_meta(&self) -> Result<Vec<MarketDescriptor>, ExplorerError> {
        Ok(Vec::new())
    }

    /// Fetches the current mid price per symbol.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_mid_prices(&self) -> Result<HashMap<String, f64>, ExplorerError> {
        Ok(HashMap::new())
    }

    /// Fetches recent trades for one symbol.
    ///
    /// # Errors
    ///
    /// Returns an [`ExplorerError`] for transport or decoding failures.
    async fn fetch_recent_trades(&self, _symbol: &str) -> Result<Vec<Trade>, ExplorerError> {
        Ok(Vec::new())
    }
}

/// Runs `fut` with a time budget; an elapsed budget becomes
/// [`ExplorerError::UpstreamTimeout`] and the future is dropped.
///
/// # Errors
///
/// Returns the future's own error, or `UpstreamTimeout`.
pub async fn with_timeout<T, F>(budget: Duration, fut: F) -> Result<T, ExplorerError>
where
    F: Future<Output = Result<T, ExplorerError>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExplorerError::UpstreamTimeout {
            timeout_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_upstream_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ExplorerError>(1)
        };
        let result = with_timeout(Duration::from_millis(250), slow).await;
        let Err(ExplorerError::UpstreamTimeout { timeout_ms }) = result else {
            panic!("expected timeout, got {result:?}");
        };
        assert_eq!(timeout_ms, 250);
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, ExplorerError>(7) }).await;
        assert_eq!(result.ok(), Some(7));
    }

    #[test]
    fn activity_record_becomes_unlinked_transaction() {
        let record = ActivityRecord {
            hash: "0xh".to_string(),
            block_number: 12,
            timestamp: 1_700_000_000_000,
            user: "0xu".to_string(),
            action_type: "order".to_string(),
            action_data: Payload::empty(),
            error: Some("bad".to_string()),
        };
        let tx = record.into_transaction();
        assert!(!tx.is_linked());
        assert_eq!(tx.block_number, 12);
        assert_eq!(tx.error.as_deref(), Some("bad"));
    }
}
