//! Persisted document layout.
//!
//! The whole store is written as one JSON document: every collection as an
//! ordered list plus the per-entity next-id counters. Every field defaults
//! when absent, so documents written by older builds still load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Block, MarketSnapshot, Trade, Transaction, Transfer, Validator, Vault};

/// Next surrogate id per entity type. Every counter starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextIds {
    /// Next block id.
    pub block: u64,
    /// Next transaction id.
    pub transaction: u64,
    /// Next validator id.
    pub validator: u64,
    /// Next vault id.
    pub vault: u64,
    /// Next transfer id.
    pub transfer: u64,
    /// Next trade id.
    pub trade: u64,
    /// Next market snapshot id.
    pub market: u64,
}

impl Default for NextIds {
    fn default() -> Self {
        Self {
            block: 1,
            transaction: 1,
            validator: 1,
            vault: 1,
            transfer: 1,
            trade: 1,
            market: 1,
        }
    }
}

/// Hands out the current value of `counter` and advances it.
pub(crate) fn take_id(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter = counter.saturating_add(1);
    id
}

/// Raises `counter` so it is strictly above every id in `ids`.
pub(crate) fn bump_past<I: IntoIterator<Item = u64>>(counter: &mut u64, ids: I) {
    if let Some(max) = ids.into_iter().max() {
        *counter = (*counter).max(max.saturating_add(1));
    }
}

/// Serialized form of the entire store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// When the document was produced.
    pub saved_at: Option<DateTime<Utc>>,
    /// Blocks ordered by id.
    pub blocks: Vec<Block>,
    /// Transactions ordered by id.
    pub transactions: Vec<Transaction>,
    /// Validators ordered by id.
    pub validators: Vec<Validator>,
    /// Vaults ordered by id.
    pub vaults: Vec<Vault>,
    /// Transfers ordered by id.
    pub transfers: Vec<Transfer>,
    /// Trades ordered by id.
    pub trades: Vec<Trade>,
    /// Market snapshots ordered by id.
    pub markets: Vec<MarketSnapshot>,
    /// Next id per entity type.
    pub next_ids: NextIds,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_defaults() {
        let Ok(state) = serde_json::from_str::<PersistedState>("{}") else {
            panic!("empty document should load");
        };
        assert!(state.blocks.is_empty());
        assert!(state.markets.is_empty());
        assert_eq!(state.next_ids, NextIds::default());
    }

    #[test]
    fn partial_counters_default_to_one() {
        let Ok(state) = serde_json::from_str::<PersistedState>(r#"{"next_ids":{"block":9}}"#)
        else {
            panic!("partial document should load");
        };
        assert_eq!(state.next_ids.block, 9);
        assert_eq!(state.next_ids.trade, 1);
    }

    #[test]
    fn take_and_bump() {
        let mut counter = 1;
        assert_eq!(take_id(&mut counter), 1);
        assert_eq!(counter, 2);
        bump_past(&mut counter, [4, 7, 2]);
        assert_eq!(counter, 8);
        bump_past(&mut counter, Vec::new());
        assert_eq!(counter, 8);
    }
}
