//! Age-based eviction and full reset.

use std::sync::Arc;
use std::time::Duration;

use super::explorer_store::ExplorerStore;
use crate::domain::Clock;
use crate::store::SweepReport;

const SECS_PER_HOUR: u64 = 3_600;

/// Removes aged-out records and resets the store on request.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    store: ExplorerStore,
    clock: Arc<dyn Clock>,
}

impl RetentionManager {
    /// Creates a manager over `store`.
    #[must_use]
    pub fn new(store: ExplorerStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Evicts every record older than `now - max_age` from every
    /// collection and rebuilds the indexes from the survivors.
    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let cutoff = self.clock.now_secs().saturating_sub(max_age_secs);
        let report = self
            .store
            .shared()
            .write()
            .await
            .evict_older_than(cutoff);
        self.store.writer().mark_dirty();
        tracing::info!(
            cutoff,
            removed = report.total(),
            blocks = report.blocks,
            transactions = report.transactions,
            "retention sweep finished"
        );
        report
    }

    /// Evicts everything older than `hours`.
    pub async fn clear_old_data(&self, hours: u64) -> SweepReport {
        self.sweep(Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR)))
            .await
    }

    /// Empties every collection, restarts id counters and flushes the
    /// empty state immediately.
    pub async fn reset_all(&self) {
        self.store.shared().write().await.reset();
        self.store.writer().mark_dirty();
        self.store.writer().flush_now().await;
        tracing::info!("store reset");
    }

    /// Alias of [`Self::reset_all`] used by the admin API.
    pub async fn clear_all_data(&self) {
        self.reset_all().await;
    }
}
