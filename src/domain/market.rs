//! Market data: trades and per-symbol snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::time::Timestamped;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    /// Taker bought.
    Buy,
    /// Taker sold.
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// Composite natural key of a [`Trade`].
///
/// Orders by symbol, then timestamp, then hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeKey {
    /// Market symbol.
    pub symbol: String,
    /// Trade time in epoch seconds.
    pub timestamp: i64,
    /// Hash of the transaction that produced the fill.
    pub tx_hash: String,
}

/// A single public trade print. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Trade {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Market symbol.
    pub symbol: String,
    /// Trade time in epoch seconds.
    pub timestamp: i64,
    /// Hash of the transaction that produced the fill.
    pub tx_hash: String,
    /// Fill price.
    pub price: f64,
    /// Fill size.
    pub size: f64,
    /// Aggressor side.
    pub side: TradeSide,
}

impl Trade {
    /// Returns the composite natural key.
    #[must_use]
    pub fn key(&self) -> TradeKey {
        TradeKey {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            tx_hash: self.tx_hash.clone(),
        }
    }
}

impl Timestamped for Trade {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Latest known state of one market; one live row per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarketSnapshot {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Market symbol (natural key).
    pub symbol: String,
    /// Mid price.
    pub price: f64,
    /// 24 h notional volume.
    #[serde(default)]
    pub volume_24h: f64,
    /// 24 h price change in percent.
    #[serde(default)]
    pub change_24h: f64,
    /// Snapshot time in epoch seconds.
    pub timestamp: i64,
}

impl Timestamped for MarketSnapshot {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Percent change from `previous` to `current`; 0 when `previous` is 0.
#[must_use]
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}
