//! Interfaces to the resource change source.
//!
//! A change source mirrors cluster state and notifies registered handlers of
//! every add, update and delete. The pipeline only needs the narrow surface
//! defined here; [`MemorySource`] is an in-process implementation.

mod memory;

pub use memory::MemorySource;

use serde_json::Value;
use std::sync::Arc;

/// Object carried by a delete notification.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject {
    /// The deleted object as last stored by the source.
    Object(Value),
    /// The source missed the delete and only knows the key and the last
    /// state it saw.
    FinalStateUnknown { key: String, last_known: Value },
}

impl DeletedObject {
    /// The last snapshot known for the deleted object.
    pub fn last_known(&self) -> &Value {
        match self {
            DeletedObject::Object(value) => value,
            DeletedObject::FinalStateUnknown { last_known, .. } => last_known,
        }
    }
}

/// Receives change notifications from a [`ChangeSource`].
///
/// Callbacks are invoked synchronously on the source's notification path and
/// must not block.
pub trait ResourceEventHandler: Send + Sync {
    fn on_add(&self, obj: &Value);
    fn on_update(&self, old: &Value, new: &Value);
    fn on_delete(&self, obj: &DeletedObject);
}

/// A mirror of resource state that emits change notifications.
pub trait ChangeSource: Send + Sync {
    /// Register a handler. Objects already mirrored are delivered to it as
    /// adds.
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>);

    /// Whether the initial state has been fully mirrored.
    fn has_synced(&self) -> bool;
}
