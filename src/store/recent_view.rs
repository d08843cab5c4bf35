//! Time-windowed, newest-first projection of a collection.
//!
//! A [`RecentView`] keeps `(timestamp, key)` pairs sorted newest-first.
//! Membership is maintained one record at a time on upsert; aged-out
//! entries are trimmed from the tail on every mutation and skipped on read,
//! and entries further in the future than the skew allowance are skipped
//! on read until the clock catches up.

use crate::domain::FreshnessWindow;

/// Sorted newest-first index of the records inside a freshness window.
#[derive(Debug, Clone)]
pub struct RecentView<K> {
    window: FreshnessWindow,
    /// Sorted descending by `(timestamp, key)`.
    entries: Vec<(i64, K)>,
}

impl<K: Ord + Clone> RecentView<K> {
    /// Creates an empty view over `window`.
    #[must_use]
    pub const fn new(window: FreshnessWindow) -> Self {
        Self {
            window,
            entries: Vec::new(),
        }
    }

    /// Number of tracked entries, including ones not yet trimmed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-evaluates membership of one record.
    ///
    /// `previous_ts` is the timestamp the record had before this write, if
    /// it existed; its old position is removed first.
    pub fn upsert(&mut self, key: K, previous_ts: Option<i64>, ts: i64, now: i64) {
        if let Some(old) = previous_ts {
            self.remove(&key, old);
        }
        self.trim(now);
        if ts < self.window.cutoff(now) {
            return;
        }
        let entry = (ts, key);
        if let Err(pos) = self.entries.binary_search_by(|probe| entry.cmp(probe)) {
            self.entries.insert(pos, entry);
        }
    }

    /// Removes one record; returns `true` if it was tracked.
    pub fn remove(&mut self, key: &K, ts: i64) -> bool {
        let found = self
            .entries
            .binary_search_by(|(probe_ts, probe_key)| (ts, key).cmp(&(*probe_ts, probe_key)));
        match found {
            Ok(pos) => {
                self.entries.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Replaces the whole view with the in-window subset of `items`.
    pub fn rebuild<I>(&mut self, items: I, now: i64)
    where
        I: IntoIterator<Item = (i64, K)>,
    {
        let cutoff = self.window.cutoff(now);
        self.entries = items.into_iter().filter(|(ts, _)| *ts >= cutoff).collect();
        self.entries.sort_unstable_by(|a, b| b.cmp(a));
        self.entries.dedup();
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates keys inside `[now - W, now + skew]`, newest first.
    pub fn newest(&self, now: i64) -> impl Iterator<Item = &K> + '_ {
        let cutoff = self.window.cutoff(now);
        let horizon = self.window.horizon(now);
        self.entries
            .iter()
            .skip_while(move |(ts, _)| *ts > horizon)
            .take_while(move |(ts, _)| *ts >= cutoff)
            .map(|(_, key)| key)
    }

    /// Number of keys currently inside the window.
    #[must_use]
    pub fn live_count(&self, now: i64) -> usize {
        self.newest(now).count()
    }

    fn trim(&mut self, now: i64) {
        let cutoff = self.window.cutoff(now);
        while self.entries.last().is_some_and(|(ts, _)| *ts < cutoff) {
            self.entries.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> RecentView<u64> {
        RecentView::new(FreshnessWindow::new(100, 10))
    }

    fn keys(view: &RecentView<u64>, now: i64) -> Vec<u64> {
        view.newest(now).copied().collect()
    }

    #[test]
    fn keeps_newest_first() {
        let mut v = view();
        v.upsert(1, None, 950, 1_000);
        v.upsert(2, None, 990, 1_000);
        v.upsert(3, None, 970, 1_000);
        assert_eq!(keys(&v, 1_000), vec![2, 3, 1]);
    }

    #[test]
    fn upsert_repositions_existing_key() {
        let mut v = view();
        v.upsert(1, None, 950, 1_000);
        v.upsert(2, None, 960, 1_000);
        v.upsert(1, Some(950), 999, 1_000);
        assert_eq!(keys(&v, 1_000), vec![1, 2]);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn old_records_are_not_admitted_and_tail_is_trimmed() {
        let mut v = view();
        v.upsert(1, None, 905, 1_000);
        v.upsert(2, None, 800, 1_000);
        assert_eq!(keys(&v, 1_000), vec![1]);

        // Clock moved on: key 1 aged out and is trimmed by the next write.
        v.upsert(3, None, 1_050, 1_050);
        assert_eq!(keys(&v, 1_050), vec![3]);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn future_entries_are_hidden_until_in_range() {
        let mut v = view();
        v.upsert(1, None, 1_500, 1_000);
        v.upsert(2, None, 1_000, 1_000);
        assert_eq!(keys(&v, 1_000), vec![2]);
        assert_eq!(keys(&v, 1_495), vec![1]);
    }

    #[test]
    fn remove_and_rebuild() {
        let mut v = view();
        v.upsert(1, None, 990, 1_000);
        assert!(v.remove(&1, 990));
        assert!(!v.remove(&1, 990));
        assert!(v.is_empty());

        v.rebuild(vec![(980, 5), (700, 6), (995, 7), (995, 7)], 1_000);
        assert_eq!(keys(&v, 1_000), vec![7, 5]);
        assert_eq!(v.live_count(1_000), 2);
    }
}
