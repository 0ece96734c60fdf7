//! Translation of change notifications into canonical events.

use serde_json::Value;
use tracing::{debug, warn};

use super::key::{KeyError, deletion_handling_key, meta_namespace_key, split_meta_namespace_key};
use super::types::{Event, EventType};
use crate::queue::RetryingQueue;
use crate::source::{DeletedObject, ResourceEventHandler};

/// Build an [`Event`] from an object key and its latest snapshot.
pub fn translate(
    event_type: EventType,
    key: &str,
    item: Value,
    resource_type: &str,
) -> Result<Event, KeyError> {
    let (namespace, name) = split_meta_namespace_key(key)?;
    Ok(Event {
        resource_name: name.to_string(),
        event_type,
        namespace: namespace.to_string(),
        resource_type: resource_type.to_string(),
        item,
    })
}

/// Change handler that turns notifications for one resource type into
/// queued events.
///
/// Registered with a [`ChangeSource`](crate::source::ChangeSource).
/// Notifications whose key cannot be derived are logged and dropped.
pub struct EventTranslator {
    resource_type: String,
    queue: RetryingQueue,
}

impl EventTranslator {
    pub fn new(resource_type: impl Into<String>, queue: RetryingQueue) -> Self {
        Self {
            resource_type: resource_type.into(),
            queue,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn enqueue(&self, event_type: EventType, key: Result<String, KeyError>, item: &Value) {
        let event = key.and_then(|key| translate(event_type, &key, item.clone(), &self.resource_type));
        match event {
            Ok(event) => {
                debug!(
                    resource_type = %self.resource_type,
                    namespace = %event.namespace,
                    name = %event.resource_name,
                    %event_type,
                    "Enqueuing event"
                );
                self.queue.add(event);
            }
            Err(e) => {
                warn!(
                    resource_type = %self.resource_type,
                    %event_type,
                    error = %e,
                    "Discarding notification with malformed key"
                );
            }
        }
    }
}

impl ResourceEventHandler for EventTranslator {
    fn on_add(&self, obj: &Value) {
        self.enqueue(EventType::Create, meta_namespace_key(obj), obj);
    }

    fn on_update(&self, _old: &Value, new: &Value) {
        self.enqueue(EventType::Update, meta_namespace_key(new), new);
    }

    fn on_delete(&self, obj: &DeletedObject) {
        self.enqueue(EventType::Delete, deletion_handling_key(obj), obj.last_known());
    }
}
