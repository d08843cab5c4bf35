//! Chain records: blocks, transactions, and transfers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::payload::Payload;
use super::time::Timestamped;

/// A block keyed by its height.
///
/// Re-ingesting the same height replaces every field except `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Block height (natural key).
    pub block_number: u64,
    /// Block hash.
    pub block_hash: String,
    /// Block time in epoch seconds.
    pub timestamp: i64,
    /// Number of transactions in the block.
    #[serde(default)]
    pub tx_count: u32,
    /// Proposer address.
    #[serde(default)]
    pub proposer: String,
    /// Raw upstream block JSON.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

impl Block {
    /// Creates a block with empty proposer and payload.
    #[must_use]
    pub fn new(block_number: u64, block_hash: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: 0,
            block_number,
            block_hash: block_hash.into(),
            timestamp,
            tx_count: 0,
            proposer: String::new(),
            payload: Payload::empty(),
        }
    }
}

impl Timestamped for Block {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A user transaction keyed by its hash.
///
/// `block_hash` is empty while the containing block is still unknown and
/// is filled in by backfill once the block is ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Transaction hash (natural key).
    pub hash: String,
    /// Height of the containing block.
    #[serde(default)]
    pub block_number: u64,
    /// Hash of the containing block, empty until known.
    #[serde(default)]
    pub block_hash: String,
    /// Transaction time in epoch seconds.
    pub timestamp: i64,
    /// Sender address.
    #[serde(default)]
    pub user: String,
    /// Action tag (e.g. `"order"`, `"usdSend"`).
    #[serde(default)]
    pub action_type: String,
    /// Raw action body.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub action_data: Payload,
    /// Upstream error message, if the action failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Raw upstream transaction JSON.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

impl Transaction {
    /// Creates a transaction with no block linkage and empty payloads.
    #[must_use]
    pub fn new(
        hash: impl Into<String>,
        block_number: u64,
        timestamp: i64,
        user: impl Into<String>,
        action_type: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            hash: hash.into(),
            block_number,
            block_hash: String::new(),
            timestamp,
            user: user.into(),
            action_type: action_type.into(),
            action_data: Payload::empty(),
            error: None,
            payload: Payload::empty(),
        }
    }

    /// Returns `true` once the containing block's hash is known.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        !self.block_hash.is_empty()
    }
}

impl Timestamped for Transaction {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A value transfer between two addresses, keyed by hash.
///
/// Transfers are insert-once: a second write with a known hash is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transfer {
    /// Surrogate id assigned by the store on first insert.
    #[serde(default)]
    pub id: u64,
    /// Transfer hash (natural key).
    pub hash: String,
    /// Height of the containing block, 0 if unknown.
    #[serde(default)]
    pub block_number: u64,
    /// Transfer time in epoch seconds.
    pub timestamp: i64,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Token symbol or identifier.
    #[serde(default)]
    pub token: String,
    /// Decimal amount, string-encoded to keep upstream precision.
    #[serde(default)]
    pub amount: String,
    /// Raw upstream JSON.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

impl Timestamped for Transfer {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}
