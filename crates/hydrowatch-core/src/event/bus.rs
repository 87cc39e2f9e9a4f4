//! Broadcast event bus for distributing `StationEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.

use hydrowatch_types::event::StationEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for station events.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers. A subscriber that falls more than `capacity` events behind
/// receives `RecvError::Lagged` with the number of skipped events and then
/// continues from the oldest retained one.
pub struct EventBus {
    sender: broadcast::Sender<StationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers. Returns how many
    /// subscribers it reached (0 when nobody listens).
    pub fn publish(&self, event: StationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrowatch_types::station::StationId;

    fn registered(id: &str) -> StationEvent {
        StationEvent::StationRegistered {
            station_id: StationId::from(id),
            timestamp: 1_700_000_000.0,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(registered("S1")), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, registered("S1"));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(registered("S1"));

        assert_eq!(rx1.recv().await.unwrap(), registered("S1"));
        assert_eq!(rx2.recv().await.unwrap(), registered("S1"));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(registered("S1")), 0);
        assert_eq!(bus.publish(registered("S2")), 0);
    }

    #[tokio::test]
    async fn per_publisher_order_is_preserved() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(registered(&format!("S{i}")));
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), registered(&format!("S{i}")));
        }
    }

    #[tokio::test]
    async fn lagged_receiver_reports_skipped_and_continues() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        for i in 0..10 {
            bus.publish(registered(&format!("S{i}")));
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => assert_eq!(skipped, 6),
            other => panic!("expected lag, got {other:?}"),
        }
        assert_eq!(rx.recv().await.unwrap(), registered("S6"));
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(registered("S1"));

        assert!(rx.try_recv().is_ok());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn debug_impl() {
        let bus = EventBus::new(16);
        let _rx = bus.subscribe();
        let debug = format!("{bus:?}");
        assert!(debug.contains("EventBus"));
        assert!(debug.contains("receiver_count"));
    }
}
