//! Folding the flat-activity view and the in-block view of a transaction.
//!
//! The same transaction is seen twice: once in the recent-activity feed
//! (height known, block hash unknown) and once inside its block (fully
//! linked). Whichever arrives first, the stored record converges to the
//! linked one.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::{Block, Transaction};
use crate::upstream::ActivityRecord;

/// Activity records linked against the stored blocks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkedActivity {
    /// Deduplicated transactions, linked where the block is known.
    pub transactions: Vec<Transaction>,
    /// Heights referenced by activity whose block is not stored yet.
    pub missing_heights: BTreeSet<u64>,
}

/// Stateless merge and linking rules for transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    /// Merges `incoming` onto `existing` (same hash).
    ///
    /// Incoming fields win, except that an empty block hash, a zero block
    /// number or a zero timestamp never replace known values. Empty
    /// payloads, user, action tag and a missing error keep the stored value.
    #[must_use]
    pub fn merge_transaction(existing: &Transaction, incoming: Transaction) -> Transaction {
        let mut merged = incoming;
        merged.id = existing.id;
        if merged.block_hash.is_empty() {
            merged.block_hash.clone_from(&existing.block_hash);
        }
        if merged.block_number == 0 {
            merged.block_number = existing.block_number;
        }
        if merged.timestamp == 0 {
            merged.timestamp = existing.timestamp;
        }
        if merged.user.is_empty() {
            merged.user.clone_from(&existing.user);
        }
        if merged.action_type.is_empty() {
            merged.action_type.clone_from(&existing.action_type);
        }
        if merged.action_data.is_empty() {
            merged.action_data = existing.action_data.clone();
        }
        if merged.payload.is_empty() {
            merged.payload = existing.payload.clone();
        }
        if merged.error.is_none() {
            merged.error.clone_from(&existing.error);
        }
        merged
    }

    /// Deduplicates an activity batch by hash and attaches known block
    /// hashes. Records without a hash are dropped.
    #[must_use]
    pub fn link_activity(
        records: Vec<ActivityRecord>,
        known_hashes: &HashMap<u64, String>,
    ) -> LinkedActivity {
        let mut seen = HashSet::new();
        let mut linked = LinkedActivity::default();
        for record in records {
            if record.hash.is_empty() || !seen.insert(record.hash.clone()) {
                continue;
            }
            let mut tx = record.into_transaction();
            match known_hashes.get(&tx.block_number) {
                Some(hash) => tx.block_hash.clone_from(hash),
                None if tx.block_number > 0 => {
                    linked.missing_heights.insert(tx.block_number);
                }
                None => {}
            }
            linked.transactions.push(tx);
        }
        linked
    }

    /// Stamps in-block transactions with their block's height, hash and
    /// (when missing) timestamp; drops hashless and duplicate entries.
    #[must_use]
    pub fn attach_block(block: &Block, transactions: Vec<Transaction>) -> Vec<Transaction> {
        let mut seen = HashSet::new();
        transactions
            .into_iter()
            .filter(|tx| !tx.hash.is_empty() && seen.insert(tx.hash.clone()))
            .map(|mut tx| {
                tx.block_number = block.block_number;
                tx.block_hash.clone_from(&block.block_hash);
                if tx.timestamp == 0 {
                    tx.timestamp = block.timestamp;
                }
                tx
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Payload;

    fn activity(hash: &str, height: u64) -> ActivityRecord {
        ActivityRecord {
            hash: hash.to_string(),
            block_number: height,
            timestamp: 1_000,
            user: "0xu".to_string(),
            action_type: "order".to_string(),
            action_data: Payload::empty(),
            error: None,
        }
    }

    #[test]
    fn merge_never_regresses_linkage() {
        let mut existing = Transaction::new("0xh", 5, 1_000, "0xu", "order");
        existing.id = 3;
        existing.block_hash = "0xblock".to_string();

        let incoming = Transaction::new("0xh", 0, 0, "", "");
        let merged = Reconciler::merge_transaction(&existing, incoming);

        assert_eq!(merged, existing);
    }

    #[test]
    fn merge_takes_new_fields() {
        let existing = Transaction::new("0xh", 5, 1_000, "0xu", "order");
        let mut incoming = Transaction::new("0xh", 5, 1_001, "0xu", "cancel");
        incoming.block_hash = "0xnew".to_string();
        let merged = Reconciler::merge_transaction(&existing, incoming);
        assert_eq!(merged.action_type, "cancel");
        assert_eq!(merged.block_hash, "0xnew");
        assert_eq!(merged.timestamp, 1_001);
    }

    #[test]
    fn link_activity_dedups_and_flags_missing_heights() {
        let known = HashMap::from([(10, "0xten".to_string())]);
        let records = vec![
            activity("0xa", 10),
            activity("0xb", 11),
            activity("0xa", 10),
            activity("", 12),
            activity("0xc", 0),
        ];
        let linked = Reconciler::link_activity(records, &known);

        let hashes: Vec<&str> = linked.transactions.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xa", "0xb", "0xc"]);
        assert_eq!(
            linked.transactions.first().map(|t| t.block_hash.as_str()),
            Some("0xten")
        );
        assert_eq!(linked.transactions.get(1).map(Transaction::is_linked), Some(false));
        assert_eq!(linked.missing_heights, BTreeSet::from([11]));
    }

    #[test]
    fn attach_block_stamps_linkage() {
        let block = Block::new(20, "0xblk", 2_000);
        let txs = vec![
            Transaction::new("0x1", 0, 0, "0xu", "order"),
            Transaction::new("0x2", 0, 1_999, "0xu", "order"),
            Transaction::new("0x1", 0, 0, "0xu", "order"),
            Transaction::new("", 0, 0, "0xu", "order"),
        ];
        let stamped = Reconciler::attach_block(&block, txs);
        assert_eq!(stamped.len(), 2);
        assert!(stamped.iter().all(|t| t.block_number == 20 && t.block_hash == "0xblk"));
        let times: Vec<i64> = stamped.iter().map(|t| t.timestamp).collect();
        assert_eq!(times, vec![2_000, 1_999]);
    }
}
