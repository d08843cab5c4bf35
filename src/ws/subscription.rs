//! Per-connection subscription manager.
//!
//! Tracks which event channels a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::BTreeSet;

use crate::domain::Channel;

/// Manages the set of channel subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed channels. Ignored while `subscribe_all` is set.
    channels: BTreeSet<Channel>,
    /// Whether the client subscribed to every channel (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds channels. `wildcard` enables every channel.
    pub fn subscribe(&mut self, channels: &[Channel], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.channels.extend(channels.iter().copied());
    }

    /// Removes channels. `wildcard` clears the wildcard and every channel.
    pub fn unsubscribe(&mut self, channels: &[Channel], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
            self.channels.clear();
            return;
        }
        for channel in channels {
            self.channels.remove(channel);
        }
    }

    /// Returns `true` if events on `channel` should be forwarded.
    #[must_use]
    pub fn matches(&self, channel: Channel) -> bool {
        self.subscribe_all || self.channels.contains(&channel)
    }

    /// Explicitly subscribed channels.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().copied().collect()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(Channel::Blocks));
    }

    #[test]
    fn subscribe_specific_channel() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Channel::Trades], false);
        assert!(mgr.matches(Channel::Trades));
        assert!(!mgr.matches(Channel::Blocks));
    }

    #[test]
    fn wildcard_matches_everything_until_cleared() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(Channel::Markets));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.matches(Channel::Markets));
    }

    #[test]
    fn unsubscribe_removes_channel() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Channel::Blocks, Channel::Transactions], false);
        mgr.unsubscribe(&[Channel::Blocks], false);
        assert_eq!(mgr.channels(), vec![Channel::Transactions]);
    }
}
