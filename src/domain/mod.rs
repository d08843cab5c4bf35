//! Domain layer: entity records, time handling, and the event system.
//!
//! This module contains the explorer's data model (blocks, transactions,
//! validators, vaults, transfers, trades, market snapshots), the central
//! timestamp normalization and freshness rules, and the event bus used to
//! broadcast newly ingested records.

pub mod chain;
pub mod event_bus;
pub mod explorer_event;
pub mod market;
pub mod network;
pub mod payload;
pub mod time;

pub use chain::{Block, Transaction, Transfer};
pub use event_bus::EventBus;
pub use explorer_event::{Channel, ExplorerEvent};
pub use market::{MarketSnapshot, Trade, TradeKey, TradeSide};
pub use network::{Validator, ValidatorStatus, Vault};
pub use payload::Payload;
pub use time::{Clock, FreshnessWindow, ManualClock, SystemClock, Timestamped, normalize_timestamp};
