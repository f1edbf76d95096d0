//! In-process event bus
//!
//! One broadcast channel per event type plus a catch-all channel. Firing an
//! event with no subscribers is not an error; the event is simply dropped.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::event::{Context, Event, EventType};
use crate::EventSink;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    listeners: DashMap<EventType, broadcast::Sender<Event>>,
    match_all_sender: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to one event type, or to everything with `*`
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn fire_event(&self, event: Event) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all_sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn fire(&self, event_type: &str, data: serde_json::Value) {
        self.fire_event(Event::new(event_type, data, Context::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fire_reaches_typed_and_match_all_subscribers() {
        let bus = EventBus::new();
        let mut typed = bus.subscribe("luxerone_residential_event");
        let mut all = bus.subscribe(EventType::match_all());

        bus.fire("luxerone_residential_event", json!({"type": "new_package_detected"}));

        let event = typed.recv().await.unwrap();
        assert_eq!(event.event_type.as_str(), "luxerone_residential_event");
        assert_eq!(event.data["type"], "new_package_detected");

        let event = all.recv().await.unwrap();
        assert_eq!(event.event_type.as_str(), "luxerone_residential_event");
    }

    #[tokio::test]
    async fn test_other_event_types_are_not_delivered() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("event_a");

        bus.fire("event_b", json!({}));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fire_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.fire("nobody_listens", json!({"n": 1}));
    }
}
