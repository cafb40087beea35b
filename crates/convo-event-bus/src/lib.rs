//! Event bus with multi-subscriber pub/sub for conversation events
//!
//! One bus instance belongs to one engine instance; there is no global
//! bus. The engine publishes lifecycle events (`start`, `message`,
//! `prompt`, ...) and callers feed answers back through `send` events on
//! the same bus, forming the half-duplex rendezvous per paused message.

use convo_core::{ChatEvent, ChatEventKind, Envelope};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to conversation events
///
/// Supports:
/// - Subscribing to one event kind
/// - Subscribing to all events
/// - Firing events to all matching subscribers, in publication order
///
/// Every published event is wrapped in an [`Envelope`] carrying a
/// monotonically increasing sequence number, so subscribers can observe the
/// bus-wide publication order.
pub struct EventBus {
    /// Map of event kinds to their broadcast senders
    listeners: DashMap<ChatEventKind, broadcast::Sender<Envelope>>,
    /// Sender for subscribe-all receivers
    match_all_sender: broadcast::Sender<Envelope>,
    /// Counter assigning publication sequence numbers
    next_seq: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            next_seq: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events of a specific kind
    ///
    /// Returns a receiver that will receive all events of the given kind
    /// fired after this call.
    pub fn subscribe(&self, kind: ChatEventKind) -> broadcast::Receiver<Envelope> {
        trace!(%kind, "Subscribing to event kind");

        self.listeners
            .entry(kind)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Envelope> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to all subscribers
    ///
    /// The event is delivered to subscribers of its kind and to
    /// subscribe-all receivers. Returns the envelope it was published in.
    pub fn fire(&self, event: ChatEvent) -> Envelope {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope::new(seq, event);

        debug!(kind = %envelope.event.kind(), seq, "Firing event");

        // Ignore send errors - they just mean no active receivers
        if let Some(sender) = self.listeners.get(&envelope.event.kind()) {
            let _ = sender.send(envelope.clone());
        }
        let _ = self.match_all_sender.send(envelope.clone());

        envelope
    }

    /// Number of event kinds with at least one past subscription
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use convo_core::{ChatMessage, Context};
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(ChatEventKind::Message);

        bus.fire(ChatEvent::Message {
            message: ChatMessage::bot("Greetings!"),
            context: Context::new(),
        });

        let received = rx.recv().await.unwrap();
        match received.event {
            ChatEvent::Message { message, .. } => assert_eq!(message.content, "Greetings!"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_kind_filtering() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(ChatEventKind::Send);

        bus.fire(ChatEvent::Start);
        bus.fire(ChatEvent::Send {
            value: json!("John"),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.kind(), ChatEventKind::Send);
        // The start event was never delivered to this receiver
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_match_all_subscription_preserves_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();

        bus.fire(ChatEvent::Start);
        bus.fire(ChatEvent::Stop);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        assert_eq!(first.event.kind(), ChatEventKind::Start);
        assert_eq!(second.event.kind(), ChatEventKind::Stop);
        assert!(first.seq < second.seq);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(ChatEventKind::Start);
        let mut rx2 = bus.subscribe(ChatEventKind::Start);

        bus.fire(ChatEvent::Start);

        assert_eq!(rx1.recv().await.unwrap().event.kind(), ChatEventKind::Start);
        assert_eq!(rx2.recv().await.unwrap().event.kind(), ChatEventKind::Start);
    }

    #[tokio::test]
    async fn test_fire_without_subscribers_is_ok() {
        let bus = EventBus::new();
        let envelope = bus.fire(ChatEvent::Start);
        assert_eq!(envelope.seq, 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.fire(ChatEvent::Start);

        let mut rx = bus.subscribe(ChatEventKind::Start);
        assert!(rx.try_recv().is_err());
    }
}
