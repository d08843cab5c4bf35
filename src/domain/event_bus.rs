//! Fan-out of ingest notifications.
//!
//! The sync cycle publishes one [`ExplorerEvent`] per newly stored record.
//! Each WebSocket connection holds its own receiver and filters by
//! [`Channel`](super::Channel) on its side.

use tokio::sync::broadcast;

use super::ExplorerEvent;

/// Cloneable handle over a `tokio::broadcast` channel of [`ExplorerEvent`]s.
///
/// Receivers that fall more than `capacity` events behind observe
/// `RecvError::Lagged` and continue from the oldest retained event.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExplorerEvent>,
}

impl EventBus {
    /// Creates a bus retaining up to `capacity` undelivered events (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `event` to every live receiver and returns how many there were.
    ///
    /// With no receivers the event is dropped and `0` is returned.
    pub fn publish(&self, event: ExplorerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Opens a receiver that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.sender.subscribe()
    }

    /// Number of open receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::domain::{Block, Channel, Trade, TradeSide, Transaction};

    const NOW: i64 = 1_700_000_000;

    fn block_event(height: u64) -> ExplorerEvent {
        ExplorerEvent::new_block(&Block::new(height, format!("0x{height:x}"), NOW))
    }

    fn trade_event() -> ExplorerEvent {
        ExplorerEvent::new_trade(&Trade {
            id: 1,
            symbol: "BTC".to_owned(),
            timestamp: NOW,
            tx_hash: "0xfill".to_owned(),
            price: 64_000.0,
            size: 0.5,
            side: TradeSide::Buy,
        })
    }

    #[test]
    fn publish_without_receivers_is_dropped() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(block_event(1)), 0);
    }

    #[tokio::test]
    async fn mixed_events_keep_order_and_channel() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(block_event(42));
        bus.publish(ExplorerEvent::new_transaction(&Transaction::new(
            "0xtx", 42, NOW, "0xuser", "order",
        )));
        bus.publish(trade_event());

        let mut seen = Vec::new();
        for _ in 0..3 {
            let Ok(event) = rx.recv().await else {
                panic!("expected an event");
            };
            seen.push((event.channel(), event.event_type_str()));
        }
        assert_eq!(
            seen,
            vec![
                (Channel::Blocks, "new_block"),
                (Channel::Transactions, "new_transaction"),
                (Channel::Trades, "new_trade"),
            ]
        );
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(8);
        let mut early = bus.subscribe();
        bus.publish(block_event(1));

        let mut late = bus.subscribe();
        assert_eq!(bus.publish(block_event(2)), 2);

        let Ok(ExplorerEvent::NewBlock { block_number, .. }) = early.recv().await else {
            panic!("early receiver should see block 1");
        };
        assert_eq!(block_number, 1);
        let Ok(ExplorerEvent::NewBlock { block_number, .. }) = late.recv().await else {
            panic!("late receiver should see block 2");
        };
        assert_eq!(block_number, 2);
    }

    #[tokio::test]
    async fn slow_receiver_lags_past_capacity() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for height in 1..=4 {
            bus.publish(block_event(height));
        }

        let Err(RecvError::Lagged(skipped)) = rx.recv().await else {
            panic!("expected lag");
        };
        assert_eq!(skipped, 2);
        let Ok(ExplorerEvent::NewBlock { block_number, .. }) = rx.recv().await else {
            panic!("expected oldest retained block");
        };
        assert_eq!(block_number, 3);
    }

    #[test]
    fn receiver_count_follows_drops() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        let clone = bus.clone();
        let _other = clone.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx);
        assert_eq!(clone.receiver_count(), 1);
    }
}
