//! Timestamp normalization, clocks, and freshness windows.
//!
//! Every timestamp in the store is epoch **seconds**. Upstream sources mix
//! seconds and milliseconds, so all raw values pass through
//! [`normalize_timestamp`] before they are stored or compared.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Raw values with a magnitude above this are treated as milliseconds.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Converts a raw upstream timestamp into epoch seconds.
///
/// Values whose magnitude exceeds [`MILLIS_THRESHOLD`] are divided by 1000.
/// This is a heuristic: a genuine seconds value that large (year 33658+)
/// would be misclassified.
#[must_use]
pub const fn normalize_timestamp(raw: i64) -> i64 {
    if raw > MILLIS_THRESHOLD || raw < -MILLIS_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}

/// Records that carry a normalized epoch-seconds timestamp.
///
/// Implemented by every stored entity; used by retention and the recent
/// views.
pub trait Timestamped {
    /// Normalized timestamp in epoch seconds.
    fn timestamp(&self) -> i64;
}

/// Source of "now" in epoch seconds.
///
/// Injected into the store and sync components so tests can pin time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in epoch seconds.
    fn now_secs(&self) -> i64;
}

/// Wall clock backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `now` (epoch seconds).
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Age bounds used to decide whether a timestamp is "fresh".
///
/// A single configured instance is shared by tip discovery and block
/// admission; the recent views use their own instance with a shorter
/// lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    /// Maximum accepted age in seconds.
    pub lookback_secs: i64,
    /// How far in the future a timestamp may be and still count.
    pub future_skew_secs: i64,
}

impl FreshnessWindow {
    /// Creates a window with the given lookback and future allowance.
    #[must_use]
    pub const fn new(lookback_secs: i64, future_skew_secs: i64) -> Self {
        Self {
            lookback_secs,
            future_skew_secs,
        }
    }

    /// Age of `ts` relative to `now`; negative for future timestamps.
    #[must_use]
    pub const fn age(ts: i64, now: i64) -> i64 {
        now.saturating_sub(ts)
    }

    /// Oldest timestamp still inside the window.
    #[must_use]
    pub const fn cutoff(&self, now: i64) -> i64 {
        now.saturating_sub(self.lookback_secs)
    }

    /// Newest timestamp still inside the window.
    #[must_use]
    pub const fn horizon(&self, now: i64) -> i64 {
        now.saturating_add(self.future_skew_secs)
    }

    /// `true` if `ts` is within the lookback and no further ahead than the
    /// skew allowance. Used for admitting freshly fetched blocks.
    #[must_use]
    pub const fn admits(&self, ts: i64, now: i64) -> bool {
        ts >= self.cutoff(now) && ts <= self.horizon(now)
    }

    /// `true` if a stored timestamp is within the lookback and not in the
    /// future at all. Used to pick a trusted starting point.
    #[must_use]
    pub const fn is_settled(&self, ts: i64, now: i64) -> bool {
        let age = Self::age(ts, now);
        age >= 0 && age <= self.lookback_secs
    }
}
