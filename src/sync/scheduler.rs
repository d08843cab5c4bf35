//! Fixed-period driver for [`SyncCycle`].

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::cycle::SyncCycle;

/// Shortest accepted period; `interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Runs `cycle` every `period` until `shutdown` flips to `true`.
///
/// Cycles never overlap: the next tick is awaited only after the current
/// run returns, and a slow run delays the following tick instead of
/// bursting. An in-flight cycle always completes before shutdown is
/// observed. A zero `period` is raised to one millisecond.
pub async fn run_scheduler(
    mut cycle: SyncCycle,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = period.max(MIN_PERIOD);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period = ?period, "sync scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let _ = cycle.run().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("sync scheduler stopped");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Clock, EventBus, FreshnessWindow, ManualClock};
    use crate::error::ExplorerError;
    use crate::service::RetentionManager;
    use crate::service::explorer_store::tests::facade;
    use crate::sync::cycle::{SyncConfig, SyncSources};
    use crate::sync::tip::tests::{FakeHeights, NOW};
    use crate::upstream::{ActivityRecord, ActivitySource};

    #[derive(Debug, Default)]
    struct CountingActivity {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ActivitySource for CountingActivity {
        async fn fetch_recent_activity(&self) -> Result<Vec<ActivityRecord>, ExplorerError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn counting_cycle() -> (SyncCycle, Arc<CountingActivity>) {
        let (store, _) = facade();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let activity = Arc::new(CountingActivity::default());
        let cycle = SyncCycle::new(
            store.clone(),
            RetentionManager::new(store, Arc::clone(&clock)),
            SyncSources {
                heights: Arc::new(FakeHeights::default()),
                activity: Arc::clone(&activity) as Arc<dyn ActivitySource>,
            },
            EventBus::new(8),
            clock,
            FreshnessWindow::new(7_200, 60),
            SyncConfig {
                sweep_probability: 0.0,
                ..SyncConfig::default()
            },
        );
        (cycle, activity)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_each_tick_and_stops_on_shutdown() {
        let (cycle, activity) = counting_cycle();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_scheduler(cycle, Duration::from_secs(2), rx));

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert!(tx.send(true).is_ok());
        assert!(handle.await.is_ok());

        assert_eq!(
            activity.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_runs() {
        let (cycle, activity) = counting_cycle();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_scheduler(cycle, Duration::ZERO, rx));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(tx.send(true).is_ok());
        assert!(handle.await.is_ok());

        assert!(activity.calls.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }
}
