//! Indexer configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default, so an empty
//! environment yields a working configuration against the public
//! endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::FreshnessWindow;
use crate::sync::{SyncConfig, TipConfig};

/// Top-level indexer configuration.
///
/// Loaded once at startup via [`ExplorerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Height-indexed block source.
    pub explorer_api_url: String,

    /// Activity, validator, vault and market source.
    pub info_api_url: String,

    /// Location of the persisted state document.
    pub data_file: PathBuf,

    /// Milliseconds between sync cycles.
    pub sync_interval_ms: u64,

    /// Per-fetch upstream timeout in milliseconds.
    pub upstream_timeout_ms: u64,

    /// Blocks older than this many seconds are not ingested.
    pub block_lookback_secs: i64,

    /// Allowance for timestamps slightly in the future.
    pub clock_skew_secs: i64,

    /// Width of the recent views served by list reads.
    pub recent_window_secs: i64,

    /// Maximum heights probed per tip discovery.
    pub tip_probe_limit: u64,

    /// Pause between tip probes in milliseconds.
    pub tip_probe_delay_ms: u64,

    /// Start height when nothing fresh is known.
    pub safe_floor_height: u64,

    /// Maximum new blocks ingested per cycle.
    pub max_batch_blocks: u64,

    /// Maximum missing blocks fetched for activity backfill per cycle.
    pub max_backfill_blocks: usize,

    /// Number of top markets whose trades are refreshed.
    pub trade_symbols: usize,

    /// Debounce window for snapshot writes in milliseconds.
    pub persist_debounce_ms: u64,

    /// Age in hours beyond which the sweep removes records.
    pub retention_hours: u64,

    /// Per-cycle chance of running the retention sweep.
    pub sweep_probability: f64,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

impl ExplorerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()?;

        let explorer_api_url = lookup("EXPLORER_API_URL")
            .unwrap_or_else(|| "https://rpc.hyperliquid.xyz/explorer".to_string());
        let info_api_url = lookup("INFO_API_URL")
            .unwrap_or_else(|| "https://api.hyperliquid.xyz/info".to_string());
        let data_file = PathBuf::from(
            lookup("DATA_FILE").unwrap_or_else(|| "data/explorer-state.json".to_string()),
        );

        let sweep_probability: f64 = parse_with(&lookup, "SWEEP_PROBABILITY", 0.02);

        Ok(Self {
            listen_addr,
            explorer_api_url,
            info_api_url,
            data_file,
            sync_interval_ms: parse_positive(&lookup, "SYNC_INTERVAL_MS", 2_000),
            upstream_timeout_ms: parse_with(&lookup, "UPSTREAM_TIMEOUT_MS", 10_000),
            block_lookback_secs: parse_with(&lookup, "BLOCK_LOOKBACK_SECS", 7_200),
            clock_skew_secs: parse_with(&lookup, "CLOCK_SKEW_SECS", 60),
            recent_window_secs: parse_with(&lookup, "RECENT_WINDOW_SECS", 3_600),
            tip_probe_limit: parse_with(&lookup, "TIP_PROBE_LIMIT", 30),
            tip_probe_delay_ms: parse_with(&lookup, "TIP_PROBE_DELAY_MS", 100),
            safe_floor_height: parse_with(&lookup, "SAFE_FLOOR_HEIGHT", 0),
            max_batch_blocks: parse_with(&lookup, "MAX_BATCH_BLOCKS", 10),
            max_backfill_blocks: parse_with(&lookup, "MAX_BACKFILL_BLOCKS", 20),
            trade_symbols: parse_with(&lookup, "TRADE_SYMBOLS", 5),
            persist_debounce_ms: parse_with(&lookup, "PERSIST_DEBOUNCE_MS", 100),
            retention_hours: parse_with(&lookup, "RETENTION_HOURS", 24),
            sweep_probability: sweep_probability.clamp(0.0, 1.0),
            event_bus_capacity: parse_with(&lookup, "EVENT_BUS_CAPACITY", 10_000),
        })
    }

    /// Window deciding which blocks are fresh enough to ingest.
    #[must_use]
    pub const fn ingest_window(&self) -> FreshnessWindow {
        FreshnessWindow::new(self.block_lookback_secs, self.clock_skew_secs)
    }

    /// Window backing the store's recent views.
    #[must_use]
    pub const fn recent_window(&self) -> FreshnessWindow {
        FreshnessWindow::new(self.recent_window_secs, self.clock_skew_secs)
    }

    /// Scheduler period.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Debounce window for the persistence writer.
    #[must_use]
    pub const fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// Per-fetch upstream timeout.
    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Tip discovery parameters.
    #[must_use]
    pub const fn tip_config(&self) -> TipConfig {
        TipConfig {
            probe_limit: self.tip_probe_limit,
            probe_delay: Duration::from_millis(self.tip_probe_delay_ms),
            safe_floor: self.safe_floor_height,
            fetch_timeout: self.upstream_timeout(),
        }
    }

    /// Sync cycle parameters.
    #[must_use]
    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            fetch_timeout: self.upstream_timeout(),
            max_batch_blocks: self.max_batch_blocks,
            max_backfill_blocks: self.max_backfill_blocks,
            trade_symbols: self.trade_symbols,
            retention: Duration::from_secs(self.retention_hours.saturating_mul(3_600)),
            sweep_probability: self.sweep_probability,
            tip: self.tip_config(),
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_with<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_with`], but zero also falls back to `default`.
fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match parse_with(lookup, key, default) {
        0 => default,
        value => value,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ExplorerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let Ok(config) = ExplorerConfig::from_lookup(|key| vars.get(key).cloned()) else {
            panic!("config should load");
        };
        config
    }

    #[test]
    fn defaults_apply_to_empty_environment() {
        let config = config_from(&[]);
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.sync_interval(), Duration::from_secs(2));
        assert_eq!(config.tip_probe_limit, 30);
        assert_eq!(config.data_file, PathBuf::from("data/explorer-state.json"));
        assert_eq!(config.sync_config().retention, Duration::from_secs(86_400));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("MAX_BATCH_BLOCKS", "lots"), ("TRADE_SYMBOLS", " 8 ")]);
        assert_eq!(config.max_batch_blocks, 10);
        assert_eq!(config.trade_symbols, 8);
    }

    #[test]
    fn zero_sync_interval_falls_back_to_default() {
        let config = config_from(&[("SYNC_INTERVAL_MS", "0")]);
        assert_eq!(config.sync_interval(), Duration::from_secs(2));
        let config = config_from(&[("SYNC_INTERVAL_MS", "250")]);
        assert_eq!(config.sync_interval(), Duration::from_millis(250));
    }

    #[test]
    fn zero_batch_size_is_kept() {
        let config = config_from(&[("MAX_BATCH_BLOCKS", "0")]);
        assert_eq!(config.sync_config().max_batch_blocks, 0);
    }

    #[test]
    fn sweep_probability_is_clamped() {
        let config = config_from(&[("SWEEP_PROBABILITY", "3.5")]);
        assert!((config.sweep_probability - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_listen_addr_is_an_error() {
        assert!(ExplorerConfig::from_lookup(|key| (key == "LISTEN_ADDR").then(|| "nope".to_owned())).is_err());
    }

    #[test]
    fn windows_share_the_clock_skew() {
        let config = config_from(&[("CLOCK_SKEW_SECS", "5"), ("RECENT_WINDOW_SECS", "600")]);
        let now = 1_700_000_000;
        assert!(config.recent_window().admits(now - 600, now));
        assert!(!config.recent_window().admits(now - 601, now));
        assert!(config.ingest_window().admits(now + 5, now));
    }
}
