//! Host capabilities for integrations
//!
//! Integrations never own the entity lifecycle, the event bus or config entry
//! storage. They talk to the host through two narrow capability traits,
//! [`StateSink`] and [`EventSink`], and receive their persisted account data
//! as a [`ConfigEntry`].
//!
//! This crate also ships an in-process host ([`EventBus`], [`StateMachine`],
//! [`ConfigEntries`]) so integrations can run standalone and be exercised
//! end to end in tests.

mod bus;
mod entity_id;
mod entry;
mod event;
mod flow;
mod states;

use std::collections::HashMap;

pub use bus::EventBus;
pub use entity_id::{generate_entity_id, slugify, EntityId, EntityIdError};
pub use entry::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntrySource};
pub use event::{Context, Event, EventType};
pub use flow::{FlowResult, FlowResultType, FormField};
pub use states::{State, StateMachine};

/// Attribute map attached to an entity state
pub type Attributes = HashMap<String, serde_json::Value>;

/// Write access to the host's entity state table
pub trait StateSink: Send + Sync {
    /// Publish the current state of an entity, replacing any previous one
    fn write_state(&self, entity_id: &EntityId, state: String, attributes: Attributes);

    /// Remove an entity's state, returning whether it existed
    fn remove_state(&self, entity_id: &EntityId) -> bool;

    /// Check whether an entity id is already in use
    fn contains(&self, entity_id: &EntityId) -> bool;
}

/// Fire-and-forget access to the host's event bus
pub trait EventSink: Send + Sync {
    fn fire(&self, event_type: &str, data: serde_json::Value);
}
