//! One incremental ingestion pass.
//!
//! A cycle runs a fixed sequence of stages. Stages are fault-isolated: a
//! failing stage is logged once at `warn`, recorded in the report, and the
//! remaining stages still run. Nothing here returns an error to the
//! scheduler.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use super::reconciler::Reconciler;
use super::tip::{TipConfig, TipDiscovery};
use crate::domain::market::percent_change;
use crate::domain::{
    Clock, EventBus, ExplorerEvent, FreshnessWindow, MarketSnapshot, Transaction,
    normalize_timestamp,
};
use crate::error::ExplorerError;
use crate::service::{ExplorerStore, RetentionManager};
use crate::upstream::{ActivitySource, BlockFetch, BlockWithTxs, HeightSource, with_timeout};

/// Tunables for [`SyncCycle`].
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Budget for every upstream fetch.
    pub fetch_timeout: Duration,
    /// Maximum new blocks ingested per cycle.
    pub max_batch_blocks: u64,
    /// Maximum missing blocks fetched for activity backfill per cycle.
    pub max_backfill_blocks: usize,
    /// Number of highest-volume markets whose trades are refreshed.
    pub trade_symbols: usize,
    /// Age beyond which the retention sweep removes records.
    pub retention: Duration,
    /// Chance per cycle of running the retention sweep.
    pub sweep_probability: f64,
    /// Tip probing parameters.
    pub tip: TipConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_batch_blocks: 10,
            max_backfill_blocks: 20,
            trade_symbols: 5,
            retention: Duration::from_secs(24 * 3_600),
            sweep_probability: 0.02,
            tip: TipConfig::default(),
        }
    }
}

/// The two upstream ports a cycle pulls from.
#[derive(Debug, Clone)]
pub struct SyncSources {
    /// Block-by-height source.
    pub heights: Arc<dyn HeightSource>,
    /// Activity, network and market source.
    pub activity: Arc<dyn ActivitySource>,
}

/// Counters describing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Frontier height found by tip discovery.
    pub frontier: u64,
    /// New blocks stored (batch and backfill).
    pub blocks: usize,
    /// Blocks fetched to link recent activity.
    pub backfilled_blocks: usize,
    /// New transactions stored.
    pub transactions: usize,
    /// Market snapshots that changed.
    pub markets: usize,
    /// New trades stored.
    pub trades: usize,
    /// Validators inserted or changed.
    pub validators: usize,
    /// Vaults inserted or changed.
    pub vaults: usize,
    /// New transfers stored.
    pub transfers: usize,
    /// Records removed by the retention sweep, if it ran.
    pub swept: Option<usize>,
    /// Stages that failed.
    pub failed_stages: Vec<&'static str>,
}

/// Pulls upstream data into the store, one bounded pass at a time.
#[derive(Debug)]
pub struct SyncCycle {
    store: ExplorerStore,
    retention: RetentionManager,
    sources: SyncSources,
    tip: TipDiscovery,
    clock: Arc<dyn Clock>,
    window: FreshnessWindow,
    events: EventBus,
    config: SyncConfig,
}

impl SyncCycle {
    /// Creates a cycle. `window` bounds which blocks are accepted.
    #[must_use]
    pub fn new(
        store: ExplorerStore,
        retention: RetentionManager,
        sources: SyncSources,
        events: EventBus,
        clock: Arc<dyn Clock>,
        window: FreshnessWindow,
        config: SyncConfig,
    ) -> Self {
        let tip = TipDiscovery::new(
            Arc::clone(&sources.heights),
            Arc::clone(&clock),
            window,
            config.tip,
        );
        Self {
            store,
            retention,
            sources,
            tip,
            clock,
            window,
            events,
            config,
        }
    }

    /// Runs every stage once and reports what changed.
    pub async fn run(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let missing = match self.ingest_activity(&mut report).await {
            Ok(missing) => missing,
            Err(e) => {
                stage_failed(&mut report, "activity", &e);
                BTreeSet::new()
            }
        };
        if let Err(e) = self.backfill(missing, &mut report).await {
            stage_failed(&mut report, "backfill", &e);
        }
        if let Err(e) = self.ingest_tip(&mut report).await {
            stage_failed(&mut report, "blocks", &e);
        }
        if let Err(e) = self.refresh_markets(&mut report).await {
            stage_failed(&mut report, "markets", &e);
        }
        if let Err(e) = self.refresh_trades(&mut report).await {
            stage_failed(&mut report, "trades", &e);
        }
        if let Err(e) = self.refresh_validators(&mut report).await {
            stage_failed(&mut report, "validators", &e);
        }
        if let Err(e) = self.refresh_vaults(&mut report).await {
            stage_failed(&mut report, "vaults", &e);
        }
        if let Err(e) = self.refresh_transfers(&mut report).await {
            stage_failed(&mut report, "transfers", &e);
        }
        self.maybe_sweep(&mut report).await;

        tracing::info!(
            frontier = report.frontier,
            blocks = report.blocks,
            transactions = report.transactions,
            trades = report.trades,
            failed = report.failed_stages.len(),
            "sync cycle finished"
        );
        report
    }

    async fn ingest_activity(
        &self,
        report: &mut CycleReport,
    ) -> Result<BTreeSet<u64>, ExplorerError> {
        let records = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_recent_activity(),
        )
        .await?;
        let heights: BTreeSet<u64> = records
            .iter()
            .map(|r| r.block_number)
            .filter(|h| *h > 0)
            .collect();
        let known = self.store.block_hashes(&heights).await;
        let linked = Reconciler::link_activity(records, &known);
        for tx in linked.transactions {
            self.ingest_transaction(tx, report).await;
        }
        Ok(linked.missing_heights)
    }

    /// Fetches the newest missing heights so their transactions get linked.
    async fn backfill(
        &self,
        missing: BTreeSet<u64>,
        report: &mut CycleReport,
    ) -> Result<(), ExplorerError> {
        let mut first_error = None;
        for height in missing.into_iter().rev().take(self.config.max_backfill_blocks) {
            match with_timeout(self.config.fetch_timeout, self.sources.heights.fetch_block(height))
                .await
            {
                Ok(BlockFetch::Found(found)) if found.is_at(height) => {
                    self.ingest_block(*found, report).await;
                    report.backfilled_blocks += 1;
                }
                Ok(BlockFetch::Found(found)) => {
                    tracing::debug!(
                        height,
                        served = found.block.block_number,
                        "skipping backfill block with wrong height"
                    );
                }
                Ok(BlockFetch::Unavailable | BlockFetch::Archived) => {
                    tracing::debug!(height, "backfill block not served");
                }
                Err(e) => {
                    tracing::debug!(height, error = %e, "backfill fetch failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn ingest_tip(&mut self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let stored = self.store.latest_tip().await;
        let mut frontier = self.tip.discover(stored).await;
        report.frontier = frontier.height;

        let now = self.clock.now_secs();
        // Resume right after a settled stored tip so gaps below the probed
        // frontier are still filled.
        let after = match stored {
            Some((height, ts)) if self.window.is_settled(normalize_timestamp(ts), now) => height,
            _ => frontier.start_from,
        };
        let Some(first) = after.checked_add(1) else {
            return Ok(());
        };
        if first > frontier.height || self.config.max_batch_blocks == 0 {
            return Ok(());
        }
        let last = frontier
            .height
            .min(first.saturating_add(self.config.max_batch_blocks.saturating_sub(1)));

        for height in first..=last {
            let block = match frontier.probed.remove(&height) {
                Some(block) => block,
                None => match with_timeout(
                    self.config.fetch_timeout,
                    self.sources.heights.fetch_block(height),
                )
                .await?
                {
                    BlockFetch::Found(found) => *found,
                    BlockFetch::Unavailable | BlockFetch::Archived => break,
                },
            };
            if !block.is_at(height) {
                tracing::debug!(
                    height,
                    served = block.block.block_number,
                    "skipping block with wrong height"
                );
                continue;
            }
            let ts = normalize_timestamp(block.block.timestamp);
            if !self.window.admits(ts, now) {
                tracing::debug!(height, ts, "rejecting block outside window");
                continue;
            }
            self.ingest_block(block, report).await;
        }
        Ok(())
    }

    async fn ingest_block(&self, fetched: BlockWithTxs, report: &mut CycleReport) {
        let BlockWithTxs {
            mut block,
            transactions,
        } = fetched;
        block.timestamp = normalize_timestamp(block.timestamp);
        let transactions = Reconciler::attach_block(&block, transactions);
        let event = ExplorerEvent::new_block(&block);

        match self.store.upsert_block(block).await {
            Ok(outcome) if outcome.is_inserted() => {
                report.blocks += 1;
                let _ = self.events.publish(event);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "skipping block");
                return;
            }
        }
        for tx in transactions {
            self.ingest_transaction(tx, report).await;
        }
    }

    async fn ingest_transaction(&self, mut tx: Transaction, report: &mut CycleReport) {
        tx.timestamp = normalize_timestamp(tx.timestamp);
        let event = ExplorerEvent::new_transaction(&tx);
        match self.store.upsert_transaction(tx).await {
            Ok(outcome) if outcome.is_inserted() => {
                report.transactions += 1;
                let _ = self.events.publish(event);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "skipping transaction"),
        }
    }

    async fn refresh_markets(&self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let meta = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_market_meta(),
        )
        .await?;
        let mids = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_mid_prices(),
        )
        .await?;
        let now = self.clock.now_secs();

        for descriptor in meta {
            let Some(price) = mids.get(&descriptor.symbol).copied() else {
                continue;
            };
            let snapshot = MarketSnapshot {
                id: 0,
                change_24h: percent_change(descriptor.prev_day_price, price),
                symbol: descriptor.symbol,
                price,
                volume_24h: descriptor.volume_24h,
                timestamp: now,
            };
            let event = ExplorerEvent::market_updated(&snapshot);
            match self.store.upsert_market(snapshot).await {
                Ok(outcome) if outcome.changed() => {
                    report.markets += 1;
                    let _ = self.events.publish(event);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "skipping market snapshot"),
            }
        }
        Ok(())
    }

    async fn refresh_trades(&self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let symbols: Vec<String> = self
            .store
            .markets()
            .await
            .into_iter()
            .take(self.config.trade_symbols)
            .map(|m| m.symbol)
            .collect();

        let mut first_error = None;
        for symbol in symbols {
            let trades = match with_timeout(
                self.config.fetch_timeout,
                self.sources.activity.fetch_recent_trades(&symbol),
            )
            .await
            {
                Ok(trades) => trades,
                Err(e) => {
                    tracing::debug!(symbol, error = %e, "trade fetch failed");
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            for mut trade in trades {
                trade.timestamp = normalize_timestamp(trade.timestamp);
                let event = ExplorerEvent::new_trade(&trade);
                match self.store.upsert_trade(trade).await {
                    Ok(outcome) if outcome.is_inserted() => {
                        report.trades += 1;
                        let _ = self.events.publish(event);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(error = %e, "skipping trade"),
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn refresh_validators(&self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let validators = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_validators(),
        )
        .await?;
        for validator in validators {
            match self.store.upsert_validator(validator).await {
                Ok(outcome) if outcome.changed() => report.validators += 1,
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "skipping validator"),
            }
        }
        Ok(())
    }

    async fn refresh_vaults(&self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let vaults = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_vaults(),
        )
        .await?;
        for vault in vaults {
            match self.store.upsert_vault(vault).await {
                Ok(outcome) if outcome.changed() => report.vaults += 1,
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "skipping vault"),
            }
        }
        Ok(())
    }

    async fn refresh_transfers(&self, report: &mut CycleReport) -> Result<(), ExplorerError> {
        let transfers = with_timeout(
            self.config.fetch_timeout,
            self.sources.activity.fetch_transfers(),
        )
        .await?;
        for transfer in transfers {
            match self.store.upsert_transfer(transfer).await {
                Ok(outcome) if outcome.is_inserted() => report.transfers += 1,
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "skipping transfer"),
            }
        }
        Ok(())
    }

    async fn maybe_sweep(&self, report: &mut CycleReport) {
        let p = self.config.sweep_probability;
        if p.is_nan() || p <= 0.0 {
            return;
        }
        let roll = rand::thread_rng().gen_bool(p.min(1.0));
        if !roll {
            return;
        }
        let swept = self.retention.sweep(self.config.retention).await;
        report.swept = Some(swept.total());
    }
}

fn stage_failed(report: &mut CycleReport, stage: &'static str, error: &ExplorerError) {
    tracing::warn!(stage, error = %error, "sync stage failed");
    report.failed_stages.push(stage);
}
