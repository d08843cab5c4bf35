//! Secondary lookup indexes over the primary collections.
//!
//! The same `index_*` / `deindex_*` helpers are used for single-record
//! upserts and for [`super::IndexedStore::rebuild_all`], so the two paths
//! cannot drift apart. Empty buckets are always removed, which makes a
//! lookup for an evicted key return nothing.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use crate::domain::{Block, Trade, TradeKey, Transaction, Transfer, ValidatorStatus};

/// Bucketed secondary indexes. Buckets are ordered so reads can walk them
/// newest-first without touching the primary collection.
#[derive(Debug, Default)]
pub(crate) struct Indexes {
    pub(crate) block_by_hash: HashMap<String, u64>,
    pub(crate) tx_by_user: HashMap<String, BTreeSet<(i64, String)>>,
    pub(crate) tx_by_action: HashMap<String, BTreeSet<(i64, String)>>,
    pub(crate) tx_by_block: HashMap<u64, BTreeSet<String>>,
    pub(crate) transfer_by_address: HashMap<String, BTreeSet<(i64, String)>>,
    pub(crate) trade_by_symbol: HashMap<String, BTreeSet<TradeKey>>,
    pub(crate) validator_by_status: HashMap<ValidatorStatus, BTreeSet<String>>,
}

/// Address keys are matched case-insensitively.
pub(crate) fn address_key(address: &str) -> String {
    address.to_ascii_lowercase()
}

fn bucket_insert<K, V>(map: &mut HashMap<K, BTreeSet<V>>, key: K, value: V)
where
    K: Eq + Hash,
    V: Ord,
{
    map.entry(key).or_default().insert(value);
}

fn bucket_remove<K, V>(map: &mut HashMap<K, BTreeSet<V>>, key: &K, value: &V)
where
    K: Eq + Hash,
    V: Ord,
{
    if let Some(bucket) = map.get_mut(key) {
        bucket.remove(value);
        if bucket.is_empty() {
            map.remove(key);
        }
    }
}

impl Indexes {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn index_block(&mut self, block: &Block) {
        self.block_by_hash
            .insert(block.block_hash.clone(), block.block_number);
    }

    pub(crate) fn deindex_block(&mut self, block: &Block) {
        if self.block_by_hash.get(&block.block_hash) == Some(&block.block_number) {
            self.block_by_hash.remove(&block.block_hash);
        }
    }

    pub(crate) fn index_transaction(&mut self, tx: &Transaction) {
        let entry = (tx.timestamp, tx.hash.clone());
        if !tx.user.is_empty() {
            bucket_insert(&mut self.tx_by_user, address_key(&tx.user), entry.clone());
        }
        if !tx.action_type.is_empty() {
            bucket_insert(&mut self.tx_by_action, tx.action_type.clone(), entry);
        }
        bucket_insert(&mut self.tx_by_block, tx.block_number, tx.hash.clone());
    }

    pub(crate) fn deindex_transaction(&mut self, tx: &Transaction) {
        let entry = (tx.timestamp, tx.hash.clone());
        bucket_remove(&mut self.tx_by_user, &address_key(&tx.user), &entry);
        bucket_remove(&mut self.tx_by_action, &tx.action_type, &entry);
        bucket_remove(&mut self.tx_by_block, &tx.block_number, &tx.hash);
    }

    pub(crate) fn index_transfer(&mut self, transfer: &Transfer) {
        let entry = (transfer.timestamp, transfer.hash.clone());
        for address in [&transfer.from, &transfer.to] {
            if !address.is_empty() {
                bucket_insert(
                    &mut self.transfer_by_address,
                    address_key(address),
                    entry.clone(),
                );
            }
        }
    }

    pub(crate) fn index_trade(&mut self, trade: &Trade) {
        bucket_insert(&mut self.trade_by_symbol, trade.symbol.clone(), trade.key());
    }

    pub(crate) fn index_validator(&mut self, address: &str, status: ValidatorStatus) {
        bucket_insert(&mut self.validator_by_status, status, address.to_string());
    }

    pub(crate) fn deindex_validator(&mut self, address: &str, status: ValidatorStatus) {
        bucket_remove(&mut self.validator_by_status, &status, &address.to_string());
    }
}
