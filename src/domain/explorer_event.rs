//! Domain events emitted when the sync cycle ingests new records.
//!
//! Every newly inserted block, transaction, trade, and refreshed market is
//! published through the [`super::EventBus`] and forwarded to WebSocket
//! subscribers of the matching [`Channel`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::{Block, Transaction};
use super::market::{MarketSnapshot, Trade, TradeSide};

/// Subscription channel a WebSocket client can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// New blocks.
    Blocks,
    /// New transactions.
    Transactions,
    /// New trades.
    Trades,
    /// Market snapshot refreshes.
    Markets,
}

impl Channel {
    /// Parses a channel name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blocks" => Some(Self::Blocks),
            "transactions" => Some(Self::Transactions),
            "trades" => Some(Self::Trades),
            "markets" => Some(Self::Markets),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blocks => "blocks",
            Self::Transactions => "transactions",
            Self::Trades => "trades",
            Self::Markets => "markets",
        };
        f.write_str(name)
    }
}

/// Event emitted after a record is first ingested.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ExplorerEvent {
    /// A block height was stored for the first time.
    NewBlock {
        /// Block height.
        block_number: u64,
        /// Block hash.
        block_hash: String,
        /// Number of transactions.
        tx_count: u32,
        /// Block time.
        block_time: i64,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A transaction hash was stored for the first time.
    NewTransaction {
        /// Transaction hash.
        hash: String,
        /// Sender address.
        user: String,
        /// Action tag.
        action_type: String,
        /// Containing block height.
        block_number: u64,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A trade print was stored.
    NewTrade {
        /// Market symbol.
        symbol: String,
        /// Fill price.
        price: f64,
        /// Fill size.
        size: f64,
        /// Aggressor side.
        side: TradeSide,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A market snapshot was refreshed.
    MarketUpdated {
        /// Market symbol.
        symbol: String,
        /// Mid price.
        price: f64,
        /// 24 h change in percent.
        change_24h: f64,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl ExplorerEvent {
    /// Builds a [`ExplorerEvent::NewBlock`] from a stored block.
    #[must_use]
    pub fn new_block(block: &Block) -> Self {
        Self::NewBlock {
            block_number: block.block_number,
            block_hash: block.block_hash.clone(),
            tx_count: block.tx_count,
            block_time: block.timestamp,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ExplorerEvent::NewTransaction`] from a stored transaction.
    #[must_use]
    pub fn new_transaction(tx: &Transaction) -> Self {
        Self::NewTransaction {
            hash: tx.hash.clone(),
            user: tx.user.clone(),
            action_type: tx.action_type.clone(),
            block_number: tx.block_number,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ExplorerEvent::NewTrade`] from a stored trade.
    #[must_use]
    pub fn new_trade(trade: &Trade) -> Self {
        Self::NewTrade {
            symbol: trade.symbol.clone(),
            price: trade.price,
            size: trade.size,
            side: trade.side,
            timestamp: Utc::now(),
        }
    }

    /// Builds a [`ExplorerEvent::MarketUpdated`] from a snapshot.
    #[must_use]
    pub fn market_updated(snapshot: &MarketSnapshot) -> Self {
        Self::MarketUpdated {
            symbol: snapshot.symbol.clone(),
            price: snapshot.price,
            change_24h: snapshot.change_24h,
            timestamp: Utc::now(),
        }
    }

    /// Returns the channel this event is delivered on.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::NewBlock { .. } => Channel::Blocks,
            Self::NewTransaction { .. } => Channel::Transactions,
            Self::NewTrade { .. } => Channel::Trades,
            Self::MarketUpdated { .. } => Channel::Markets,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::NewBlock { .. } => "new_block",
            Self::NewTransaction { .. } => "new_transaction",
            Self::NewTrade { .. } => "new_trade",
            Self::MarketUpdated { .. } => "market_updated",
        }
    }
}
