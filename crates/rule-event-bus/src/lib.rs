//! Topic-keyed pub/sub bus for trigger events
//!
//! Bindings and other trigger sources publish [`TriggerEvent`]s here; the
//! rule engine subscribes. Publication is non-blocking broadcast, so a
//! trigger source regains control immediately while rule pipelines run
//! out-of-band on their own tasks.

use dashmap::DashMap;
use rule_core::event::Topic;
use rule_core::TriggerEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to trigger events
///
/// Supports subscribing to a specific topic, subscribing to all topics,
/// and fan-out publication to every active subscriber.
pub struct EventBus {
    /// Map of topics to their broadcast senders
    listeners: DashMap<Topic, broadcast::Sender<TriggerEvent>>,
    /// Special sender for match-all subscribers
    match_all_sender: broadcast::Sender<TriggerEvent>,
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
            capacity,
        }
    }

    /// Subscribe to events published under a specific topic
    pub fn subscribe(&self, topic: impl Into<Topic>) -> broadcast::Receiver<TriggerEvent> {
        let topic = topic.into();
        trace!(topic = %topic, "Subscribing to topic");

        if topic.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(topic)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to every event regardless of topic
    pub fn subscribe_all(&self) -> broadcast::Receiver<TriggerEvent> {
        self.match_all_sender.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// The event is delivered to subscribers of its topic and to all
    /// match-all subscribers. Publishing never blocks the caller.
    pub fn publish(&self, event: TriggerEvent) {
        debug!(topic = %event.topic, "Publishing trigger event");

        // Send errors just mean no active receivers
        if let Some(sender) = self.listeners.get(&event.topic) {
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Get the number of active per-topic subscriptions
    pub fn topic_count(&self) -> usize {
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
