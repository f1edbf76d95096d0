//! Entity state table
//!
//! Stores the latest [`State`] per entity and announces every write on the
//! bus as `state_changed`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::bus::EventBus;
use crate::event::{Context, Event};
use crate::{Attributes, EntityId, StateSink};

pub const EVENT_STATE_CHANGED: &str = "state_changed";

/// The state of an entity at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// When the state value last changed
    pub last_changed: DateTime<Utc>,
    /// When the state or its attributes were last written
    pub last_updated: DateTime<Utc>,
}

impl State {
    /// Get a typed attribute value
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

pub struct StateMachine {
    states: DashMap<String, State>,
    bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            bus,
        }
    }

    /// Set an entity's state
    ///
    /// `last_changed` only moves when the state value differs from the
    /// previous one.
    #[instrument(skip(self, state, attributes), fields(entity_id = %entity_id))]
    pub fn set(&self, entity_id: &EntityId, state: String, attributes: Attributes) -> State {
        let now = Utc::now();
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let last_changed = match &old_state {
            Some(old) if old.state == state => old.last_changed,
            _ => now,
        };
        let new_state = State {
            entity_id: entity_id.clone(),
            state,
            attributes,
            last_changed,
            last_updated: now,
        };

        debug!(state = %new_state.state, "Setting entity state");
        self.states.insert(key, new_state.clone());

        self.bus.fire_event(Event::new(
            EVENT_STATE_CHANGED,
            json!({
                "entity_id": entity_id,
                "old_state": old_state,
                "new_state": new_state,
            }),
            Context::new(),
        ));

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Remove an entity's state, announcing it with a `null` new state
    pub fn remove(&self, entity_id: &EntityId) -> Option<State> {
        let old_state = self.states.remove(&entity_id.to_string()).map(|(_, s)| s);

        if old_state.is_some() {
            self.bus.fire_event(Event::new(
                EVENT_STATE_CHANGED,
                json!({
                    "entity_id": entity_id,
                    "old_state": old_state,
                    "new_state": null,
                }),
                Context::new(),
            ));
        }

        old_state
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

impl StateSink for StateMachine {
    fn write_state(&self, entity_id: &EntityId, state: String, attributes: Attributes) {
        self.set(entity_id, state, attributes);
    }

    fn remove_state(&self, entity_id: &EntityId) -> bool {
        self.remove(entity_id).is_some()
    }

    fn contains(&self, entity_id: &EntityId) -> bool {
        self.states.contains_key(&entity_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (Arc<EventBus>, StateMachine) {
        let bus = Arc::new(EventBus::new());
        (bus.clone(), StateMachine::new(bus))
    }

    #[test]
    fn test_last_changed_only_moves_on_value_change() {
        let (_bus, states) = machine();
        let id = EntityId::new("sensor", "packages").unwrap();

        let first = states.set(&id, "1".to_string(), Attributes::new());
        let mut attrs = Attributes::new();
        attrs.insert("package_codes".to_string(), json!(["A1"]));
        let second = states.set(&id, "1".to_string(), attrs);
        assert_eq!(first.last_changed, second.last_changed);
        assert_eq!(second.attribute::<Vec<String>>("package_codes").unwrap(), vec!["A1"]);

        let third = states.set(&id, "2".to_string(), Attributes::new());
        assert!(third.last_changed >= second.last_updated);
        assert_eq!(states.get("sensor.packages").unwrap().state, "2");
    }

    #[tokio::test]
    async fn test_set_and_remove_fire_state_changed() {
        let (bus, states) = machine();
        let mut rx = bus.subscribe(EVENT_STATE_CHANGED);
        let id = EntityId::new("sensor", "packages").unwrap();

        states.write_state(&id, "0".to_string(), Attributes::new());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.data["entity_id"], "sensor.packages");
        assert!(event.data["old_state"].is_null());

        assert!(states.contains(&id));
        assert!(states.remove_state(&id));
        let event = rx.recv().await.unwrap();
        assert!(event.data["new_state"].is_null());

        assert!(!states.remove_state(&id));
        assert_eq!(states.entity_count(), 0);
    }
}
