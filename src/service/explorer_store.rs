//! Store facade shared by the sync cycle, retention and the API layer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::{
    Block, MarketSnapshot, Trade, Transaction, Transfer, Validator, ValidatorStatus, Vault,
};
use crate::error::ExplorerError;
use crate::persistence::PersistenceWriter;
use crate::store::{IndexedStore, StoreStats, UpsertOutcome};

/// Lock-holding wrapper around [`IndexedStore`].
///
/// Every call takes the lock for exactly one store operation and never
/// holds it across an `.await`. Writes that change the store mark the
/// persistence writer dirty; reads return owned copies.
#[derive(Debug, Clone)]
pub struct ExplorerStore {
    inner: Arc<RwLock<IndexedStore>>,
    writer: PersistenceWriter,
}

impl ExplorerStore {
    /// Wraps a shared store and its writer.
    #[must_use]
    pub fn new(inner: Arc<RwLock<IndexedStore>>, writer: PersistenceWriter) -> Self {
        Self { inner, writer }
    }

    /// Returns the shared store handle.
    #[must_use]
    pub fn shared(&self) -> &Arc<RwLock<IndexedStore>> {
        &self.inner
    }

    /// Returns the persistence writer.
    #[must_use]
    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    async fn apply<F>(&self, op: F) -> Result<UpsertOutcome, ExplorerError>
    where
        F: FnOnce(&mut IndexedStore) -> Result<UpsertOutcome, ExplorerError>,
    {
        let outcome = {
            let mut store = self.inner.write().await;
            op(&mut store)?
        };
        if outcome.changed() {
            self.writer.mark_dirty();
        }
        Ok(outcome)
    }

    /// Upserts a block (replace-whole, backfills linked transactions).
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for a hashless block.
    pub async fn upsert_block(&self, block: Block) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_block(block)).await
    }

    /// Upserts a transaction through the reconciling merge.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for a hashless transaction.
    pub async fn upsert_transaction(&self, tx: Transaction) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_transaction(tx)).await
    }

    /// Upserts a validator (field merge).
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for an empty address.
    pub async fn upsert_validator(
        &self,
        validator: Validator,
    ) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_validator(validator)).await
    }

    /// Upserts a vault (field merge).
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for an empty address.
    pub async fn upsert_vault(&self, vault: Vault) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_vault(vault)).await
    }

    /// Inserts a transfer unless its hash is known.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for a hashless transfer.
    pub async fn upsert_transfer(&self, transfer: Transfer) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_transfer(transfer)).await
    }

    /// Inserts a trade unless its composite key is known.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for an empty symbol.
    pub async fn upsert_trade(&self, trade: Trade) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_trade(trade)).await
    }

    /// Replaces the live snapshot of a market.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] for an empty symbol.
    pub async fn upsert_market(
        &self,
        snapshot: MarketSnapshot,
    ) -> Result<UpsertOutcome, ExplorerError> {
        self.apply(|store| store.upsert_market(snapshot)).await
    }

    /// Highest stored block.
    pub async fn latest_block(&self) -> Option<Block> {
        self.inner.read().await.latest_block().cloned()
    }

    /// Height and timestamp of the highest stored block.
    pub async fn latest_tip(&self) -> Option<(u64, i64)> {
        self.inner
            .read()
            .await
            .latest_block()
            .map(|b| (b.block_number, b.timestamp))
    }

    /// Block at a height.
    pub async fn block(&self, block_number: u64) -> Option<Block> {
        self.inner.read().await.block(block_number).cloned()
    }

    /// Block by hash.
    pub async fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.inner.read().await.block_by_hash(hash).cloned()
    }

    /// Known block hashes for the given heights.
    pub async fn block_hashes<'a, I>(&self, heights: I) -> HashMap<u64, String>
    where
        I: IntoIterator<Item = &'a u64>,
    {
        self.inner.read().await.block_hashes(heights)
    }

    /// Newest blocks.
    pub async fn blocks(&self, limit: usize) -> Vec<Block> {
        self.inner.read().await.blocks(limit)
    }

    /// Transaction by hash.
    pub async fn transaction(&self, hash: &str) -> Option<Transaction> {
        self.inner.read().await.transaction(hash).cloned()
    }

    /// Newest transactions.
    pub async fn transactions(&self, limit: usize) -> Vec<Transaction> {
        self.inner.read().await.transactions(limit)
    }

    /// Newest transactions by sender.
    pub async fn transactions_by_user(&self, user: &str, limit: usize) -> Vec<Transaction> {
        self.inner.read().await.transactions_by_user(user, limit)
    }

    /// Newest transactions by action tag.
    pub async fn transactions_by_action_type(
        &self,
        action_type: &str,
        limit: usize,
    ) -> Vec<Transaction> {
        self.inner
            .read()
            .await
            .transactions_by_action_type(action_type, limit)
    }

    /// Transactions in one block.
    pub async fn transactions_in_block(&self, block_number: u64) -> Vec<Transaction> {
        self.inner.read().await.transactions_in_block(block_number)
    }

    /// Validator by address.
    pub async fn validator(&self, address: &str) -> Option<Validator> {
        self.inner.read().await.validator(address).cloned()
    }

    /// Validators by voting power.
    pub async fn validators(&self, limit: usize) -> Vec<Validator> {
        self.inner.read().await.validators(limit)
    }

    /// Validators in one status.
    pub async fn validators_by_status(&self, status: ValidatorStatus) -> Vec<Validator> {
        self.inner.read().await.validators_by_status(status)
    }

    /// Vault by address.
    pub async fn vault(&self, address: &str) -> Option<Vault> {
        self.inner.read().await.vault(address).cloned()
    }

    /// Vaults by equity.
    pub async fn vaults(&self, limit: usize) -> Vec<Vault> {
        self.inner.read().await.vaults(limit)
    }

    /// Newest transfers.
    pub async fn transfers(&self, limit: usize) -> Vec<Transfer> {
        self.inner.read().await.transfers(limit)
    }

    /// Newest transfers touching an address.
    pub async fn transfers_by_address(&self, address: &str, limit: usize) -> Vec<Transfer> {
        self.inner.read().await.transfers_by_address(address, limit)
    }

    /// Newest trades across all markets.
    pub async fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.inner.read().await.recent_trades(limit)
    }

    /// Newest trades of one market.
    pub async fn trades_by_symbol(&self, symbol: &str, limit: usize) -> Vec<Trade> {
        self.inner.read().await.trades_by_symbol(symbol, limit)
    }

    /// Live market snapshots by volume.
    pub async fn markets(&self) -> Vec<MarketSnapshot> {
        self.inner.read().await.markets()
    }

    /// Live snapshot of one market.
    pub async fn market(&self, symbol: &str) -> Option<MarketSnapshot> {
        self.inner.read().await.market(symbol).cloned()
    }

    /// Aggregate counters.
    pub async fn stats(&self) -> StoreStats {
        self.inner.read().await.stats()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::persistence::SnapshotSink;
    use crate::persistence::writer::tests::{CountingSink, empty_store};

    pub(crate) fn facade() -> (ExplorerStore, Arc<CountingSink>) {
        let sink = Arc::new(CountingSink::default());
        let store = empty_store();
        let writer = PersistenceWriter::spawn(
            Arc::clone(&store),
            Arc::clone(&sink) as Arc<dyn SnapshotSink>,
            Duration::from_millis(100),
        );
        (ExplorerStore::new(store, writer), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn only_changing_writes_mark_dirty() {
        let (store, sink) = facade();
        let block = Block::new(1, "0xa", 1_700_000_000);

        let Ok(first) = store.upsert_block(block.clone()).await else {
            panic!("insert failed");
        };
        assert!(first.is_inserted());
        assert!(store.writer().is_dirty());
        store.writer().flush_now().await;
        assert!(!store.writer().is_dirty());

        let Ok(again) = store.upsert_block(block).await else {
            panic!("reinsert failed");
        };
        assert!(!again.changed());
        assert!(!store.writer().is_dirty());
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ten_upserts_in_fifty_ms_flush_once() {
        let (store, sink) = facade();
        for n in 0..10u64 {
            let _ = store
                .upsert_transaction(Transaction::new(format!("0x{n}"), 1, 1_700_000_000, "0xu", "order"))
                .await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.count(), 1);
        assert_eq!(store.stats().await.total_transactions, 10);
    }

    #[tokio::test]
    async fn invalid_record_is_propagated() {
        let (store, _) = facade();
        let result = store.upsert_vault(Vault::new("", "x", 1)).await;
        assert!(matches!(result, Err(ExplorerError::InvalidRecord(_))));
        assert!(!store.writer().is_dirty());
    }
}
