//! In-memory entity store with secondary indexes and recent views.
//!
//! [`IndexedStore`] owns every collection and performs no I/O. Each
//! mutating method is a single synchronous step: callers hold the store's
//! lock for exactly one call, so no half-updated index is ever observable.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::indexes::{Indexes, address_key};
use super::recent_view::RecentView;
use super::snapshot::{NextIds, PersistedState, bump_past, take_id};
use crate::domain::{
    Block, Clock, FreshnessWindow, MarketSnapshot, Timestamped, Trade, TradeKey, Transaction,
    Transfer, Validator, ValidatorStatus, Vault, normalize_timestamp,
};
use crate::error::ExplorerError;
use crate::sync::Reconciler;

/// Number of newest blocks used to estimate the block interval.
const BLOCK_TIME_SAMPLE: usize = 100;

/// Result of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New natural key; carries the freshly assigned id.
    Inserted(u64),
    /// Existing key whose record changed; carries the preserved id.
    Updated(u64),
    /// Existing key and nothing changed (or the entity is insert-once).
    Unchanged(u64),
}

impl UpsertOutcome {
    /// Surrogate id of the live record.
    #[must_use]
    pub const fn id(&self) -> u64 {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Unchanged(id) => *id,
        }
    }

    /// `true` if the key was new.
    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    /// `true` if the store changed and needs persisting.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Per-entity counts removed by a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Blocks removed.
    pub blocks: usize,
    /// Transactions removed.
    pub transactions: usize,
    /// Validators removed.
    pub validators: usize,
    /// Vaults removed.
    pub vaults: usize,
    /// Transfers removed.
    pub transfers: usize,
    /// Trades removed.
    pub trades: usize,
    /// Market snapshots removed.
    pub markets: usize,
}

impl SweepReport {
    /// Total records removed across every type.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.blocks
            + self.transactions
            + self.validators
            + self.vaults
            + self.transfers
            + self.trades
            + self.markets
    }
}

/// Aggregate counters served by `GET /stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct StoreStats {
    /// Stored blocks.
    pub total_blocks: usize,
    /// Stored transactions.
    pub total_transactions: usize,
    /// Stored validators.
    pub total_validators: usize,
    /// Validators with status `active`.
    pub active_validators: usize,
    /// Stored vaults.
    pub total_vaults: usize,
    /// Stored transfers.
    pub total_transfers: usize,
    /// Stored trades.
    pub total_trades: usize,
    /// Markets with a live snapshot.
    pub total_markets: usize,
    /// Highest stored block height.
    pub latest_block_height: Option<u64>,
    /// Time of the highest stored block.
    pub latest_block_time: Option<i64>,
    /// Transactions inside the recent window.
    pub recent_transactions: usize,
    /// Mean seconds between the newest blocks.
    pub avg_block_time_secs: Option<f64>,
}

/// Owner of every entity collection, its indexes and its recent views.
#[derive(Debug)]
pub struct IndexedStore {
    clock: Arc<dyn Clock>,
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<String, Transaction>,
    validators: HashMap<String, Validator>,
    vaults: HashMap<String, Vault>,
    transfers: HashMap<String, Transfer>,
    trades: HashMap<TradeKey, Trade>,
    markets: BTreeMap<String, MarketSnapshot>,
    next_ids: NextIds,
    indexes: Indexes,
    recent_blocks: RecentView<u64>,
    recent_transactions: RecentView<String>,
    recent_transfers: RecentView<String>,
    recent_trades: RecentView<TradeKey>,
}

impl IndexedStore {
    /// Creates an empty store whose recent views cover `recent_window`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, recent_window: FreshnessWindow) -> Self {
        Self {
            clock,
            blocks: BTreeMap::new(),
            transactions: HashMap::new(),
            validators: HashMap::new(),
            vaults: HashMap::new(),
            transfers: HashMap::new(),
            trades: HashMap::new(),
            markets: BTreeMap::new(),
            next_ids: NextIds::default(),
            indexes: Indexes::default(),
            recent_blocks: RecentView::new(recent_window),
            recent_transactions: RecentView::new(recent_window),
            recent_transfers: RecentView::new(recent_window),
            recent_trades: RecentView::new(recent_window),
        }
    }

    /// Restores a store from a persisted document and rebuilds every index.
    ///
    /// Id counters are raised above the highest stored id so a document
    /// with stale counters can never cause id reuse.
    #[must_use]
    pub fn from_persisted(
        state: PersistedState,
        clock: Arc<dyn Clock>,
        recent_window: FreshnessWindow,
    ) -> Self {
        let mut store = Self::new(clock, recent_window);
        let mut next_ids = state.next_ids;
        bump_past(&mut next_ids.block, state.blocks.iter().map(|b| b.id));
        bump_past(&mut next_ids.transaction, state.transactions.iter().map(|t| t.id));
        bump_past(&mut next_ids.validator, state.validators.iter().map(|v| v.id));
        bump_past(&mut next_ids.vault, state.vaults.iter().map(|v| v.id));
        bump_past(&mut next_ids.transfer, state.transfers.iter().map(|t| t.id));
        bump_past(&mut next_ids.trade, state.trades.iter().map(|t| t.id));
        bump_past(&mut next_ids.market, state.markets.iter().map(|m| m.id));
        store.next_ids = next_ids;

        store.blocks = state
            .blocks
            .into_iter()
            .map(|b| (b.block_number, b))
            .collect();
        store.transactions = state
            .transactions
            .into_iter()
            .map(|t| (t.hash.clone(), t))
            .collect();
        store.validators = state
            .validators
            .into_iter()
            .map(|v| (v.address.clone(), v))
            .collect();
        store.vaults = state
            .vaults
            .into_iter()
            .map(|v| (v.address.clone(), v))
            .collect();
        store.transfers = state
            .transfers
            .into_iter()
            .map(|t| (t.hash.clone(), t))
            .collect();
        store.trades = state.trades.into_iter().map(|t| (t.key(), t)).collect();
        store.markets = state
            .markets
            .into_iter()
            .map(|m| (m.symbol.clone(), m))
            .collect();
        store.rebuild_all();
        store
    }

    /// Serializes every collection, each ordered by id.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            saved_at: Some(chrono::Utc::now()),
            blocks: sorted_by_id(self.blocks.values(), |b| b.id),
            transactions: sorted_by_id(self.transactions.values(), |t| t.id),
            validators: sorted_by_id(self.validators.values(), |v| v.id),
            vaults: sorted_by_id(self.vaults.values(), |v| v.id),
            transfers: sorted_by_id(self.transfers.values(), |t| t.id),
            trades: sorted_by_id(self.trades.values(), |t| t.id),
            markets: sorted_by_id(self.markets.values(), |m| m.id),
            next_ids: self.next_ids,
        }
    }

    /// Current next-id counters.
    #[must_use]
    pub const fn next_ids(&self) -> NextIds {
        self.next_ids
    }

    fn now(&self) -> i64 {
        self.clock.now_secs()
    }

    // ---------------------------------------------------------------------
    // Upserts
    // ---------------------------------------------------------------------

    /// Inserts or replaces a block, then backfills its hash into every
    /// stored transaction at that height that is still unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the block has no hash.
    pub fn upsert_block(&mut self, mut block: Block) -> Result<UpsertOutcome, ExplorerError> {
        if block.block_hash.is_empty() {
            return Err(ExplorerError::InvalidRecord(format!(
                "block {} has no hash",
                block.block_number
            )));
        }
        block.timestamp = normalize_timestamp(block.timestamp);
        let now = self.now();

        let (outcome, previous_ts) = match self.blocks.get(&block.block_number) {
            Some(existing) => {
                block.id = existing.id;
                if *existing == block {
                    return Ok(UpsertOutcome::Unchanged(existing.id));
                }
                self.indexes.deindex_block(existing);
                (UpsertOutcome::Updated(existing.id), Some(existing.timestamp))
            }
            None => {
                block.id = take_id(&mut self.next_ids.block);
                (UpsertOutcome::Inserted(block.id), None)
            }
        };

        let number = block.block_number;
        let hash = block.block_hash.clone();
        self.indexes.index_block(&block);
        self.recent_blocks
            .upsert(number, previous_ts, block.timestamp, now);
        self.blocks.insert(number, block);

        let backfilled = self.backfill_block_hash(number, &hash);
        if backfilled > 0 {
            tracing::debug!(block_number = number, backfilled, "linked transactions to block");
        }
        Ok(outcome)
    }

    /// Sets `hash` on every unlinked transaction at `block_number`.
    /// Returns how many transactions were linked.
    pub fn backfill_block_hash(&mut self, block_number: u64, hash: &str) -> usize {
        let Some(hashes) = self.indexes.tx_by_block.get(&block_number) else {
            return 0;
        };
        let mut linked = 0;
        for tx_hash in hashes {
            if let Some(tx) = self.transactions.get_mut(tx_hash)
                && tx.block_hash.is_empty()
            {
                tx.block_hash = hash.to_string();
                linked += 1;
            }
        }
        linked
    }

    /// Inserts or reconciles a transaction.
    ///
    /// The block hash is attached immediately when the block is already
    /// stored; an existing populated hash is never cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the hash is empty.
    pub fn upsert_transaction(
        &mut self,
        mut incoming: Transaction,
    ) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.hash.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "transaction has no hash".to_string(),
            ));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);
        if incoming.block_hash.is_empty()
            && incoming.block_number != 0
            && let Some(block) = self.blocks.get(&incoming.block_number)
        {
            incoming.block_hash = block.block_hash.clone();
        }
        let now = self.now();

        let (record, outcome, previous_ts) = match self.transactions.get(&incoming.hash) {
            Some(existing) => {
                let merged = Reconciler::merge_transaction(existing, incoming);
                if merged == *existing {
                    return Ok(UpsertOutcome::Unchanged(existing.id));
                }
                self.indexes.deindex_transaction(existing);
                (
                    merged,
                    UpsertOutcome::Updated(existing.id),
                    Some(existing.timestamp),
                )
            }
            None => {
                incoming.id = take_id(&mut self.next_ids.transaction);
                let id = incoming.id;
                (incoming, UpsertOutcome::Inserted(id), None)
            }
        };

        self.indexes.index_transaction(&record);
        self.recent_transactions
            .upsert(record.hash.clone(), previous_ts, record.timestamp, now);
        self.transactions.insert(record.hash.clone(), record);
        Ok(outcome)
    }

    /// Inserts a validator or field-merges onto the existing one.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the address is empty.
    pub fn upsert_validator(
        &mut self,
        mut incoming: Validator,
    ) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.address.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "validator has no address".to_string(),
            ));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);

        if let Some(existing) = self.validators.get_mut(&incoming.address) {
            let before = existing.clone();
            existing.merge_from(incoming);
            if *existing == before {
                return Ok(UpsertOutcome::Unchanged(existing.id));
            }
            if existing.status != before.status {
                self.indexes
                    .deindex_validator(&existing.address, before.status);
                self.indexes
                    .index_validator(&existing.address, existing.status);
            }
            return Ok(UpsertOutcome::Updated(existing.id));
        }

        incoming.id = take_id(&mut self.next_ids.validator);
        let id = incoming.id;
        self.indexes
            .index_validator(&incoming.address, incoming.status);
        self.validators.insert(incoming.address.clone(), incoming);
        Ok(UpsertOutcome::Inserted(id))
    }

    /// Inserts a vault or field-merges onto the existing one.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the address is empty.
    pub fn upsert_vault(&mut self, mut incoming: Vault) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.address.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "vault has no address".to_string(),
            ));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);

        if let Some(existing) = self.vaults.get_mut(&incoming.address) {
            let before = existing.clone();
            existing.merge_from(incoming);
            if *existing == before {
                return Ok(UpsertOutcome::Unchanged(existing.id));
            }
            return Ok(UpsertOutcome::Updated(existing.id));
        }

        incoming.id = take_id(&mut self.next_ids.vault);
        let id = incoming.id;
        self.vaults.insert(incoming.address.clone(), incoming);
        Ok(UpsertOutcome::Inserted(id))
    }

    /// Inserts a transfer; a known hash is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the hash is empty.
    pub fn upsert_transfer(
        &mut self,
        mut incoming: Transfer,
    ) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.hash.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "transfer has no hash".to_string(),
            ));
        }
        if let Some(existing) = self.transfers.get(&incoming.hash) {
            return Ok(UpsertOutcome::Unchanged(existing.id));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);
        incoming.id = take_id(&mut self.next_ids.transfer);
        let id = incoming.id;
        let now = self.now();

        self.indexes.index_transfer(&incoming);
        self.recent_transfers
            .upsert(incoming.hash.clone(), None, incoming.timestamp, now);
        self.transfers.insert(incoming.hash.clone(), incoming);
        Ok(UpsertOutcome::Inserted(id))
    }

    /// Appends a trade; a known `(symbol, timestamp, tx_hash)` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the symbol is empty.
    pub fn upsert_trade(&mut self, mut incoming: Trade) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.symbol.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "trade has no symbol".to_string(),
            ));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);
        let key = incoming.key();
        if let Some(existing) = self.trades.get(&key) {
            return Ok(UpsertOutcome::Unchanged(existing.id));
        }
        incoming.id = take_id(&mut self.next_ids.trade);
        let id = incoming.id;
        let now = self.now();

        self.indexes.index_trade(&incoming);
        self.recent_trades
            .upsert(key.clone(), None, incoming.timestamp, now);
        self.trades.insert(key, incoming);
        Ok(UpsertOutcome::Inserted(id))
    }

    /// Replaces the live snapshot for a symbol, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRecord`] if the symbol is empty.
    pub fn upsert_market(
        &mut self,
        mut incoming: MarketSnapshot,
    ) -> Result<UpsertOutcome, ExplorerError> {
        if incoming.symbol.is_empty() {
            return Err(ExplorerError::InvalidRecord(
                "market snapshot has no symbol".to_string(),
            ));
        }
        incoming.timestamp = normalize_timestamp(incoming.timestamp);
        let outcome = match self.markets.get(&incoming.symbol) {
            Some(existing) => {
                incoming.id = existing.id;
                if *existing == incoming {
                    return Ok(UpsertOutcome::Unchanged(existing.id));
                }
                UpsertOutcome::Updated(existing.id)
            }
            None => {
                incoming.id = take_id(&mut self.next_ids.market);
                UpsertOutcome::Inserted(incoming.id)
            }
        };
        self.markets.insert(incoming.symbol.clone(), incoming);
        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Highest stored block.
    #[must_use]
    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last_key_value().map(|(_, block)| block)
    }

    /// Block at `block_number`.
    #[must_use]
    pub fn block(&self, block_number: u64) -> Option<&Block> {
        self.blocks.get(&block_number)
    }

    /// Block with the given hash.
    #[must_use]
    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.indexes
            .block_by_hash
            .get(hash)
            .and_then(|number| self.blocks.get(number))
    }

    /// Known hashes for the requested heights; unknown heights are absent.
    #[must_use]
    pub fn block_hashes<'a, I>(&self, heights: I) -> HashMap<u64, String>
    where
        I: IntoIterator<Item = &'a u64>,
    {
        heights
            .into_iter()
            .filter_map(|h| self.blocks.get(h).map(|b| (*h, b.block_hash.clone())))
            .collect()
    }

    /// Newest blocks first.
    ///
    /// Served from the recent view; when the view holds fewer than
    /// `min(limit, total)` blocks (cold start, clock skew) the whole
    /// collection is sorted instead.
    #[must_use]
    pub fn blocks(&self, limit: usize) -> Vec<Block> {
        let now = self.now();
        let from_view: Vec<Block> = self
            .recent_blocks
            .newest(now)
            .filter_map(|n| self.blocks.get(n))
            .take(limit)
            .cloned()
            .collect();
        if from_view.len() >= limit.min(self.blocks.len()) {
            return from_view;
        }
        newest_by_time(self.blocks.values().rev(), limit)
    }

    /// Transaction by hash.
    #[must_use]
    pub fn transaction(&self, hash: &str) -> Option<&Transaction> {
        self.transactions.get(hash)
    }

    /// Newest transactions first, with the same fallback as [`Self::blocks`].
    #[must_use]
    pub fn transactions(&self, limit: usize) -> Vec<Transaction> {
        let now = self.now();
        let from_view: Vec<Transaction> = self
            .recent_transactions
            .newest(now)
            .filter_map(|h| self.transactions.get(h))
            .take(limit)
            .cloned()
            .collect();
        if from_view.len() >= limit.min(self.transactions.len()) {
            return from_view;
        }
        newest_by_time(self.transactions.values(), limit)
    }

    /// Newest transactions sent by `user` (case-insensitive).
    #[must_use]
    pub fn transactions_by_user(&self, user: &str, limit: usize) -> Vec<Transaction> {
        self.indexes
            .tx_by_user
            .get(&address_key(user))
            .map(|bucket| self.resolve_transactions(bucket.iter().rev(), limit))
            .unwrap_or_default()
    }

    /// Newest transactions with the given action tag.
    #[must_use]
    pub fn transactions_by_action_type(&self, action_type: &str, limit: usize) -> Vec<Transaction> {
        self.indexes
            .tx_by_action
            .get(action_type)
            .map(|bucket| self.resolve_transactions(bucket.iter().rev(), limit))
            .unwrap_or_default()
    }

    /// Every stored transaction at `block_number`, newest first.
    #[must_use]
    pub fn transactions_in_block(&self, block_number: u64) -> Vec<Transaction> {
        let Some(hashes) = self.indexes.tx_by_block.get(&block_number) else {
            return Vec::new();
        };
        let mut txs: Vec<Transaction> = hashes
            .iter()
            .filter_map(|h| self.transactions.get(h))
            .cloned()
            .collect();
        txs.sort_by_key(|tx| Reverse(tx.timestamp));
        txs
    }

    fn resolve_transactions<'a, I>(&self, entries: I, limit: usize) -> Vec<Transaction>
    where
        I: Iterator<Item = &'a (i64, String)>,
    {
        entries
            .filter_map(|(_, hash)| self.transactions.get(hash))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Validator by address.
    #[must_use]
    pub fn validator(&self, address: &str) -> Option<&Validator> {
        self.validators.get(address)
    }

    /// Validators by voting power, highest first.
    #[must_use]
    pub fn validators(&self, limit: usize) -> Vec<Validator> {
        let mut all: Vec<Validator> = self.validators.values().cloned().collect();
        all.sort_by(|a, b| b.voting_power.total_cmp(&a.voting_power));
        all.truncate(limit);
        all
    }

    /// Validators currently in `status`, ordered by address.
    #[must_use]
    pub fn validators_by_status(&self, status: ValidatorStatus) -> Vec<Validator> {
        self.indexes
            .validator_by_status
            .get(&status)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|a| self.validators.get(a))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Vault by address.
    #[must_use]
    pub fn vault(&self, address: &str) -> Option<&Vault> {
        self.vaults.get(address)
    }

    /// Vaults by equity, highest first.
    #[must_use]
    pub fn vaults(&self, limit: usize) -> Vec<Vault> {
        let mut all: Vec<Vault> = self.vaults.values().cloned().collect();
        all.sort_by(|a, b| b.equity.total_cmp(&a.equity));
        all.truncate(limit);
        all
    }

    /// Newest transfers first, with the same fallback as [`Self::blocks`].
    #[must_use]
    pub fn transfers(&self, limit: usize) -> Vec<Transfer> {
        let now = self.now();
        let from_view: Vec<Transfer> = self
            .recent_transfers
            .newest(now)
            .filter_map(|h| self.transfers.get(h))
            .take(limit)
            .cloned()
            .collect();
        if from_view.len() >= limit.min(self.transfers.len()) {
            return from_view;
        }
        newest_by_time(self.transfers.values(), limit)
    }

    /// Newest transfers sent or received by `address` (case-insensitive).
    #[must_use]
    pub fn transfers_by_address(&self, address: &str, limit: usize) -> Vec<Transfer> {
        self.indexes
            .transfer_by_address
            .get(&address_key(address))
            .map(|bucket| {
                bucket
                    .iter()
                    .rev()
                    .filter_map(|(_, hash)| self.transfers.get(hash))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Newest trades across all symbols, with the usual fallback.
    #[must_use]
    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        let now = self.now();
        let from_view: Vec<Trade> = self
            .recent_trades
            .newest(now)
            .filter_map(|k| self.trades.get(k))
            .take(limit)
            .cloned()
            .collect();
        if from_view.len() >= limit.min(self.trades.len()) {
            return from_view;
        }
        newest_by_time(self.trades.values(), limit)
    }

    /// Newest trades for one symbol.
    #[must_use]
    pub fn trades_by_symbol(&self, symbol: &str, limit: usize) -> Vec<Trade> {
        self.indexes
            .trade_by_symbol
            .get(symbol)
            .map(|bucket| {
                bucket
                    .iter()
                    .rev()
                    .filter_map(|k| self.trades.get(k))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live snapshot for a symbol.
    #[must_use]
    pub fn market(&self, symbol: &str) -> Option<&MarketSnapshot> {
        self.markets.get(symbol)
    }

    /// All live snapshots by 24 h volume, highest first.
    #[must_use]
    pub fn markets(&self) -> Vec<MarketSnapshot> {
        let mut all: Vec<MarketSnapshot> = self.markets.values().cloned().collect();
        all.sort_by(|a, b| b.volume_24h.total_cmp(&a.volume_24h));
        all
    }

    /// Aggregate counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let now = self.now();
        let latest = self.latest_block();
        let sample: Vec<i64> = self
            .blocks
            .values()
            .rev()
            .take(BLOCK_TIME_SAMPLE)
            .map(|b| b.timestamp)
            .collect();
        let avg_block_time_secs = match (sample.first(), sample.last()) {
            (Some(newest), Some(oldest)) if sample.len() > 1 => {
                #[allow(clippy::cast_precision_loss)]
                let avg = (newest - oldest) as f64 / (sample.len() - 1) as f64;
                Some(avg)
            }
            _ => None,
        };

        StoreStats {
            total_blocks: self.blocks.len(),
            total_transactions: self.transactions.len(),
            total_validators: self.validators.len(),
            active_validators: self
                .indexes
                .validator_by_status
                .get(&ValidatorStatus::Active)
                .map_or(0, |bucket| bucket.len()),
            total_vaults: self.vaults.len(),
            total_transfers: self.transfers.len(),
            total_trades: self.trades.len(),
            total_markets: self.markets.len(),
            latest_block_height: latest.map(|b| b.block_number),
            latest_block_time: latest.map(|b| b.timestamp),
            recent_transactions: self.recent_transactions.live_count(now),
            avg_block_time_secs,
        }
    }

    // ---------------------------------------------------------------------
    // Bulk maintenance
    // ---------------------------------------------------------------------

    /// Removes every record with a timestamp before `cutoff`, then rebuilds
    /// all indexes and views from the survivors.
    pub fn evict_older_than(&mut self, cutoff: i64) -> SweepReport {
        let report = SweepReport {
            blocks: evict_btree(&mut self.blocks, cutoff),
            transactions: evict_hash(&mut self.transactions, cutoff),
            validators: evict_hash(&mut self.validators, cutoff),
            vaults: evict_hash(&mut self.vaults, cutoff),
            transfers: evict_hash(&mut self.transfers, cutoff),
            trades: evict_hash(&mut self.trades, cutoff),
            markets: evict_btree(&mut self.markets, cutoff),
        };
        self.rebuild_all();
        report
    }

    /// Empties every collection and resets the id counters to 1.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.transactions.clear();
        self.validators.clear();
        self.vaults.clear();
        self.transfers.clear();
        self.trades.clear();
        self.markets.clear();
        self.next_ids = NextIds::default();
        self.rebuild_all();
    }

    /// Recomputes every secondary index and recent view from the primary
    /// collections.
    pub fn rebuild_all(&mut self) {
        let now = self.now();
        self.indexes.clear();
        for block in self.blocks.values() {
            self.indexes.index_block(block);
        }
        for tx in self.transactions.values() {
            self.indexes.index_transaction(tx);
        }
        for validator in self.validators.values() {
            self.indexes
                .index_validator(&validator.address, validator.status);
        }
        for transfer in self.transfers.values() {
            self.indexes.index_transfer(transfer);
        }
        for trade in self.trades.values() {
            self.indexes.index_trade(trade);
        }

        self.recent_blocks.rebuild(
            self.blocks.values().map(|b| (b.timestamp, b.block_number)),
            now,
        );
        self.recent_transactions.rebuild(
            self.transactions
                .values()
                .map(|t| (t.timestamp, t.hash.clone())),
            now,
        );
        self.recent_transfers.rebuild(
            self.transfers.values().map(|t| (t.timestamp, t.hash.clone())),
            now,
        );
        self.recent_trades
            .rebuild(self.trades.values().map(|t| (t.timestamp, t.key())), now);
    }
}

fn sorted_by_id<'a, T, F>(items: impl Iterator<Item = &'a T>, id: F) -> Vec<T>
where
    T: Clone + 'a,
    F: Fn(&T) -> u64,
{
    let mut out: Vec<T> = items.cloned().collect();
    out.sort_by_key(|item| id(item));
    out
}

fn newest_by_time<'a, T>(items: impl Iterator<Item = &'a T>, limit: usize) -> Vec<T>
where
    T: Timestamped + Clone + 'a,
{
    let mut all: Vec<&T> = items.collect();
    all.sort_by_key(|item| Reverse(item.timestamp()));
    all.into_iter().take(limit).cloned().collect()
}

fn evict_hash<K, V: Timestamped>(map: &mut HashMap<K, V>, cutoff: i64) -> usize {
    let before = map.len();
    map.retain(|_, record| record.timestamp() >= cutoff);
    before - map.len()
}

fn evict_btree<K: Ord, V: Timestamped>(map: &mut BTreeMap<K, V>, cutoff: i64) -> usize {
    let before = map.len();
    map.retain(|_, record| record.timestamp() >= cutoff);
    before - map.len()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ManualClock, Payload, TradeSide};

    const NOW: i64 = 1_700_000_000;

    fn store_at(now: i64) -> (IndexedStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let shared: Arc<dyn Clock> = Arc::<ManualClock>::clone(&clock);
        let store = IndexedStore::new(shared, FreshnessWindow::new(3_600, 60));
        (store, clock)
    }

    fn block(number: u64, hash: &str, ts: i64) -> Block {
        Block::new(number, hash, ts)
    }

    fn trade(symbol: &str, ts: i64, hash: &str) -> Trade {
        Trade {
            id: 0,
            symbol: symbol.to_string(),
            timestamp: ts,
            tx_hash: hash.to_string(),
            price: 100.0,
            size: 1.0,
            side: TradeSide::Buy,
        }
    }

    fn transfer(hash: &str, from: &str, to: &str, ts: i64) -> Transfer {
        Transfer {
            id: 0,
            hash: hash.to_string(),
            block_number: 0,
            timestamp: ts,
            from: from.to_string(),
            to: to.to_string(),
            token: "USDC".to_string(),
            amount: "10".to_string(),
            payload: Payload::empty(),
        }
    }

    #[test]
    fn replace_whole_keeps_first_id_and_second_payload() {
        let (mut store, _) = store_at(NOW);
        let Ok(first) = store.upsert_block(block(10, "0xa", NOW - 5)) else {
            panic!("insert failed");
        };
        let mut second = block(10, "0xb", NOW - 4);
        second.proposer = "0xprop".to_string();
        let Ok(outcome) = store.upsert_block(second) else {
            panic!("update failed");
        };

        assert!(first.is_inserted());
        assert_eq!(outcome, UpsertOutcome::Updated(first.id()));
        let Some(stored) = store.block(10) else {
            panic!("block missing");
        };
        assert_eq!(stored.id, first.id());
        assert_eq!(stored.block_hash, "0xb");
        assert_eq!(stored.proposer, "0xprop");
        assert!(store.block_by_hash("0xa").is_none());
        assert_eq!(store.block_by_hash("0xb").map(|b| b.block_number), Some(10));
    }

    #[test]
    fn market_replace_preserves_id() {
        let (mut store, _) = store_at(NOW);
        let snapshot = |price: f64| MarketSnapshot {
            id: 0,
            symbol: "ETH".to_string(),
            price,
            volume_24h: 5.0,
            change_24h: 0.0,
            timestamp: NOW,
        };
        let first = store.upsert_market(snapshot(1.0)).map(|o| o.id()).ok();
        let second = store.upsert_market(snapshot(2.0)).ok();
        assert_eq!(second, first.map(UpsertOutcome::Updated));
        assert_eq!(store.market("ETH").map(|m| m.price), Some(2.0));
        assert_eq!(store.next_ids().market, 2);
    }

    #[test]
    fn identical_reinsert_is_unchanged() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xa", NOW));
        let outcome = store.upsert_block(block(1, "0xa", NOW)).ok();
        assert_eq!(outcome, Some(UpsertOutcome::Unchanged(1)));
    }

    #[test]
    fn validator_merge_does_not_clobber() {
        let (mut store, _) = store_at(NOW);
        let mut v = Validator::new("0xval", ValidatorStatus::Active, NOW);
        v.voting_power = 500.0;
        v.uptime = 98.0;
        v.name = "node-1".to_string();
        let _ = store.upsert_validator(v);

        let update = Validator::new("0xval", ValidatorStatus::Jailed, 0);
        let outcome = store.upsert_validator(update).ok();
        assert_eq!(outcome, Some(UpsertOutcome::Updated(1)));

        let Some(stored) = store.validator("0xval") else {
            panic!("validator missing");
        };
        assert!((stored.voting_power - 500.0).abs() < f64::EPSILON);
        assert!((stored.uptime - 98.0).abs() < f64::EPSILON);
        assert_eq!(stored.name, "node-1");
        assert_eq!(stored.timestamp, NOW);
        assert!(store.validators_by_status(ValidatorStatus::Active).is_empty());
        assert_eq!(store.validators_by_status(ValidatorStatus::Jailed).len(), 1);
    }

    #[test]
    fn vault_merge_does_not_clobber() {
        let (mut store, _) = store_at(NOW);
        let mut v = Vault::new("0xvault", "HLP", NOW);
        v.equity = 1_000.0;
        let _ = store.upsert_vault(v);

        let mut update = Vault::new("0xvault", "", 0);
        update.total_deposits = 50.0;
        let _ = store.upsert_vault(update);

        let Some(stored) = store.vault("0xvault") else {
            panic!("vault missing");
        };
        assert_eq!(stored.name, "HLP");
        assert!((stored.equity - 1_000.0).abs() < f64::EPSILON);
        assert!((stored.total_deposits - 50.0).abs() < f64::EPSILON);
        assert_eq!(stored.id, 1);
    }

    #[test]
    fn transfer_and_trade_reinsert_are_noops() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_transfer(transfer("0xt", "0xA", "0xB", NOW));
        let _ = store.upsert_trade(trade("BTC", NOW, "0xh"));
        let ids_before = store.next_ids();

        let mut changed = transfer("0xt", "0xC", "0xD", NOW + 1);
        changed.amount = "999".to_string();
        let t = store.upsert_transfer(changed).ok();
        let tr = store.upsert_trade(trade("BTC", NOW, "0xh")).ok();

        assert_eq!(t, Some(UpsertOutcome::Unchanged(1)));
        assert_eq!(tr, Some(UpsertOutcome::Unchanged(1)));
        assert_eq!(store.next_ids(), ids_before);
        assert_eq!(store.stats().total_transfers, 1);
        assert_eq!(store.stats().total_trades, 1);
        assert_eq!(store.transfers(10).first().map(|t| t.amount.as_str()), Some("10"));
        assert!(store.transfers_by_address("0xc", 10).is_empty());
        assert_eq!(store.transfers_by_address("0xa", 10).len(), 1);
    }

    #[test]
    fn ids_increase_per_entity_type() {
        let (mut store, _) = store_at(NOW);
        let ids: Vec<u64> = (1..=3)
            .filter_map(|n| store.upsert_block(block(n, &format!("0x{n}"), NOW)).ok())
            .map(|o| o.id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let tx = store
            .upsert_transaction(Transaction::new("0xtx", 1, NOW, "0xu", "order"))
            .ok();
        assert_eq!(tx, Some(UpsertOutcome::Inserted(1)));
    }

    #[test]
    fn block_upsert_backfills_unlinked_transactions() {
        let (mut store, _) = store_at(NOW);
        let mut tx = Transaction::new("0xtx", 42, NOW - 1, "0xuser", "order");
        tx.action_data = Payload::new(serde_json::json!({"type": "order"}));
        let Ok(inserted) = store.upsert_transaction(tx.clone()) else {
            panic!("tx insert failed");
        };
        assert_eq!(store.transaction("0xtx").map(|t| t.is_linked()), Some(false));

        let _ = store.upsert_block(block(42, "0xabc", NOW - 1));

        let Some(linked) = store.transaction("0xtx") else {
            panic!("tx missing");
        };
        assert_eq!(linked.block_hash, "0xabc");
        assert_eq!(linked.id, inserted.id());
        assert_eq!(linked.user, tx.user);
        assert_eq!(linked.action_data, tx.action_data);
        assert_eq!(linked.timestamp, tx.timestamp);
    }

    #[test]
    fn transaction_attaches_known_block_hash_on_insert() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_block(block(7, "0xseven", NOW));
        let _ = store.upsert_transaction(Transaction::new("0xtx", 7, NOW, "0xu", "order"));
        assert_eq!(
            store.transaction("0xtx").map(|t| t.block_hash.as_str()),
            Some("0xseven")
        );
    }

    #[test]
    fn populated_block_hash_is_never_cleared() {
        let (mut store, _) = store_at(NOW);
        let mut linked = Transaction::new("0xtx", 9, NOW, "0xu", "order");
        linked.block_hash = "0xnine".to_string();
        let _ = store.upsert_transaction(linked);

        let mut flat = Transaction::new("0xtx", 9, NOW, "0xu", "order");
        flat.error = Some("rejected".to_string());
        let _ = store.upsert_transaction(flat);

        let Some(stored) = store.transaction("0xtx") else {
            panic!("tx missing");
        };
        assert_eq!(stored.block_hash, "0xnine");
        assert_eq!(stored.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn millisecond_timestamps_are_normalized() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xa", NOW * 1000 + 250));
        assert_eq!(store.block(1).map(|b| b.timestamp), Some(NOW));
    }

    #[test]
    fn secondary_indexes_return_newest_first() {
        let (mut store, _) = store_at(NOW);
        for (i, hash) in ["0x1", "0x2", "0x3"].iter().enumerate() {
            let ts = NOW - 100 + i64::try_from(i).unwrap_or(0);
            let _ = store.upsert_transaction(Transaction::new(*hash, 1, ts, "0xAlice", "order"));
        }
        let _ = store.upsert_transaction(Transaction::new("0x4", 1, NOW, "0xbob", "cancel"));

        let alice: Vec<String> = store
            .transactions_by_user("0xalice", 2)
            .into_iter()
            .map(|t| t.hash)
            .collect();
        assert_eq!(alice, vec!["0x3".to_string(), "0x2".to_string()]);
        assert_eq!(store.transactions_by_action_type("cancel", 10).len(), 1);
        assert_eq!(store.transactions_in_block(1).len(), 4);
    }

    #[test]
    fn blocks_fall_back_when_view_is_short() {
        let (mut store, _) = store_at(NOW);
        // Two fresh blocks, three outside the recent window.
        for n in 1..=3 {
            let _ = store.upsert_block(block(n, &format!("0xold{n}"), NOW - 10_000 + n as i64));
        }
        for n in 4..=5 {
            let _ = store.upsert_block(block(n, &format!("0xnew{n}"), NOW - 10 + n as i64));
        }

        let blocks = store.blocks(4);
        assert_eq!(blocks.len(), 4);
        let numbers: Vec<u64> = blocks.iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![5, 4, 3, 2]);

        assert_eq!(store.blocks(2).len(), 2);
        assert_eq!(store.blocks(50).len(), 5);
    }

    #[test]
    fn blocks_fall_back_when_view_is_empty() {
        let (mut store, clock) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xa", NOW));
        let _ = store.upsert_block(block(2, "0xb", NOW + 1));
        clock.advance(100_000);
        let numbers: Vec<u64> = store.blocks(10).iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn evict_keeps_indexes_consistent() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xold", NOW - 7_200));
        let _ = store.upsert_block(block(2, "0xnew", NOW));
        let _ = store.upsert_transaction(Transaction::new("0xold_tx", 1, NOW - 7_200, "0xu", "order"));
        let _ = store.upsert_transaction(Transaction::new("0xnew_tx", 2, NOW, "0xu", "order"));
        let _ = store.upsert_transfer(transfer("0xold_tr", "0xa", "0xb", NOW - 7_200));
        let _ = store.upsert_trade(trade("BTC", NOW - 7_200, "0xold_fill"));
        let _ = store.upsert_validator(Validator::new("0xv", ValidatorStatus::Active, NOW - 7_200));

        let report = store.evict_older_than(NOW - 3_600);

        assert_eq!(report.blocks, 1);
        assert_eq!(report.transactions, 1);
        assert_eq!(report.transfers, 1);
        assert_eq!(report.trades, 1);
        assert_eq!(report.validators, 1);
        assert_eq!(report.total(), 5);
        assert!(store.block_by_hash("0xold").is_none());
        assert!(store.transactions_in_block(1).is_empty());
        assert_eq!(store.transactions_by_user("0xu", 10).len(), 1);
        assert!(store.transfers_by_address("0xa", 10).is_empty());
        assert!(store.trades_by_symbol("BTC", 10).is_empty());
        assert!(store.validators_by_status(ValidatorStatus::Active).is_empty());
        assert_eq!(store.stats().active_validators, 0);
    }

    #[test]
    fn reset_clears_everything_and_restarts_ids() {
        let (mut store, _) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xa", NOW));
        let _ = store.upsert_transaction(Transaction::new("0xtx", 1, NOW, "0xu", "order"));
        store.reset();

        assert_eq!(store.stats(), StoreStats::default());
        assert_eq!(store.next_ids(), NextIds::default());
        let outcome = store.upsert_block(block(5, "0xe", NOW)).ok();
        assert_eq!(outcome, Some(UpsertOutcome::Inserted(1)));
    }

    #[test]
    fn persisted_round_trip_restores_indexes_and_counters() {
        let (mut store, clock) = store_at(NOW);
        let _ = store.upsert_block(block(1, "0xa", NOW));
        let _ = store.upsert_transaction(Transaction::new("0xtx", 1, NOW, "0xUser", "order"));
        let _ = store.upsert_trade(trade("ETH", NOW, "0xf"));

        let mut state = store.to_persisted();
        state.next_ids = NextIds::default();
        let restored = IndexedStore::from_persisted(state, clock, FreshnessWindow::new(3_600, 60));

        assert_eq!(restored.block_by_hash("0xa").map(|b| b.id), Some(1));
        assert_eq!(restored.transactions_by_user("0xuser", 5).len(), 1);
        assert_eq!(restored.trades_by_symbol("ETH", 5).len(), 1);
        assert_eq!(restored.next_ids().block, 2);
        assert_eq!(restored.next_ids().transaction, 2);
        assert_eq!(restored.blocks(5).len(), 1);
    }

    #[test]
    fn invalid_records_are_rejected() {
        let (mut store, _) = store_at(NOW);
        assert!(store.upsert_block(block(1, "", NOW)).is_err());
        assert!(
            store
                .upsert_transaction(Transaction::new("", 1, NOW, "0xu", "order"))
                .is_err()
        );
        assert!(store.upsert_trade(trade("", NOW, "0xh")).is_err());
        assert_eq!(store.next_ids(), NextIds::default());
    }

    #[test]
    fn stats_report_block_interval() {
        let (mut store, _) = store_at(NOW);
        for n in 0..5u64 {
            let _ = store.upsert_block(block(n, &format!("0x{n}"), NOW - 8 + 2 * n as i64));
        }
        let stats = store.stats();
        assert_eq!(stats.latest_block_height, Some(4));
        assert_eq!(stats.avg_block_time_secs, Some(2.0));
    }
}
