//! The canonical change event pushed to clients.

use serde::{Deserialize, Serialize};

/// Kind of mutation an [`Event`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Create => write!(f, "Create"),
            EventType::Update => write!(f, "Update"),
            EventType::Delete => write!(f, "Delete"),
        }
    }
}

/// A single resource change.
///
/// Serialized as one JSON object per WebSocket data frame:
///
/// ```json
/// {"resourceName":"pod-a","eventType":"Create","namespace":"default","resourceType":"pods","item":{ ... }}
/// ```
///
/// `item` is the latest snapshot known when the event was enqueued. It is
/// not guaranteed to be the state at delivery time, and intermediate states
/// of the same resource may have been coalesced away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub resource_name: String,
    pub event_type: EventType,
    /// Empty for cluster-scoped resources.
    pub namespace: String,
    pub resource_type: String,
    pub item: serde_json::Value,
}
