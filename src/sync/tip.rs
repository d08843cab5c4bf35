//! Chain-tip discovery by forward probing.
//!
//! The height source has no "latest block" call, so the frontier is found
//! by walking forward from the newest settled height until the source
//! reports a height that does not exist yet, has been pruned, or returns a
//! block outside the freshness window.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Clock, FreshnessWindow, normalize_timestamp};
use crate::upstream::{BlockFetch, BlockWithTxs, HeightSource, with_timeout};

/// Probing parameters.
#[derive(Debug, Clone, Copy)]
pub struct TipConfig {
    /// Maximum heights probed per discovery.
    pub probe_limit: u64,
    /// Pause between consecutive probes.
    pub probe_delay: Duration,
    /// Start height when nothing fresh is known.
    pub safe_floor: u64,
    /// Budget for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for TipConfig {
    fn default() -> Self {
        Self {
            probe_limit: 30,
            probe_delay: Duration::from_millis(100),
            safe_floor: 0,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one discovery.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    /// Height probing started after.
    pub start_from: u64,
    /// Highest accepted height; equals `start_from` if nothing was accepted.
    pub height: u64,
    /// Blocks accepted while probing, keyed by height.
    pub probed: BTreeMap<u64, BlockWithTxs>,
    /// Number of fetches issued.
    pub calls: usize,
}

/// Stateful frontier finder.
///
/// Remembers the last accepted height so a discovery can resume from it
/// even when the store has not caught up yet.
#[derive(Debug)]
pub struct TipDiscovery {
    source: Arc<dyn HeightSource>,
    clock: Arc<dyn Clock>,
    window: FreshnessWindow,
    config: TipConfig,
    last_accepted: Option<(u64, i64)>,
}

impl TipDiscovery {
    /// Creates a discovery over `source` using `window` for freshness.
    #[must_use]
    pub fn new(
        source: Arc<dyn HeightSource>,
        clock: Arc<dyn Clock>,
        window: FreshnessWindow,
        config: TipConfig,
    ) -> Self {
        Self {
            source,
            clock,
            window,
            config,
            last_accepted: None,
        }
    }

    /// Last height accepted by any discovery, with its timestamp.
    #[must_use]
    pub const fn last_accepted(&self) -> Option<(u64, i64)> {
        self.last_accepted
    }

    /// Picks the newest settled height among the stored tip and the last
    /// accepted one; falls back to the safe floor.
    #[must_use]
    pub fn start_from(&self, stored_tip: Option<(u64, i64)>) -> u64 {
        let now = self.clock.now_secs();
        [stored_tip, self.last_accepted]
            .into_iter()
            .flatten()
            .filter(|(_, ts)| self.window.is_settled(normalize_timestamp(*ts), now))
            .map(|(height, _)| height)
            .max()
            .unwrap_or(self.config.safe_floor)
    }

    /// Probes forward from [`Self::start_from`] and returns the frontier.
    ///
    /// Never fails: transport errors and timeouts end probing and the
    /// last accepted height is returned.
    pub async fn discover(&mut self, stored_tip: Option<(u64, i64)>) -> Frontier {
        let start_from = self.start_from(stored_tip);
        let now = self.clock.now_secs();
        let mut frontier = Frontier {
            start_from,
            height: start_from,
            ..Frontier::default()
        };

        let Some(first) = start_from.checked_add(1) else {
            return frontier;
        };
        for height in first..=start_from.saturating_add(self.config.probe_limit) {
            if frontier.calls > 0 && !self.config.probe_delay.is_zero() {
                tokio::time::sleep(self.config.probe_delay).await;
            }
            frontier.calls += 1;

            let fetched = with_timeout(self.config.fetch_timeout, self.source.fetch_block(height)).await;
            match fetched {
                Ok(BlockFetch::Found(found)) => {
                    if !found.is_at(height) {
                        tracing::debug!(
                            height,
                            served = found.block.block_number,
                            "tip search stopped at block with wrong height"
                        );
                        break;
                    }
                    let ts = normalize_timestamp(found.block.timestamp);
                    if !self.window.admits(ts, now) {
                        tracing::debug!(height, ts, now, "probe stopped at block outside window");
                        break;
                    }
                    frontier.height = height;
                    self.last_accepted = Some((height, ts));
                    frontier.probed.insert(height, *found);
                }
                Ok(BlockFetch::Unavailable) => {
                    tracing::debug!(height, "probe reached unproduced height");
                    break;
                }
                Ok(BlockFetch::Archived) => {
                    tracing::debug!(height, "probe hit archived height");
                    break;
                }
                Err(e) => {
                    tracing::debug!(height, error = %e, "probe aborted");
                    break;
                }
            }
        }

        frontier
    }
}
