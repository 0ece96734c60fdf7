//! Event type definitions.

pub use watchcast_sdk::objects::{Event, EventType};

/// Identity of the resource an [`Event`] refers to.
///
/// Deduplication and retry bookkeeping in the queue are keyed by this value,
/// so two events with the same key are two states of the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub resource_type: String,
    pub namespace: String,
    pub name: String,
}

impl EventKey {
    pub fn of(event: &Event) -> Self {
        Self {
            resource_type: event.resource_type.clone(),
            namespace: event.namespace.clone(),
            name: event.resource_name.clone(),
        }
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}:{}", self.resource_type, self.name)
        } else {
            write!(f, "{}:{}/{}", self.resource_type, self.namespace, self.name)
        }
    }
}
