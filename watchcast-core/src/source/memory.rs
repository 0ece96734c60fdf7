use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::{ChangeSource, DeletedObject, ResourceEventHandler};
use crate::events::{KeyError, meta_namespace_key};

/// In-process change source keyed by `namespace/name`.
///
/// Cheap to clone; clones share the same mirror.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<MemorySourceInner>,
}

#[derive(Default)]
struct MemorySourceInner {
    // Notifications are emitted while the lock is held so that handlers see
    // changes to one key in the order they were applied.
    state: Mutex<MirrorState>,
    synced: AtomicBool,
}

#[derive(Default)]
struct MirrorState {
    objects: BTreeMap<String, Value>,
    handlers: Vec<Arc<dyn ResourceEventHandler>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `obj`, notifying handlers of an add or an update.
    ///
    /// Returns the object's key.
    pub fn apply(&self, obj: Value) -> Result<String, KeyError> {
        let key = meta_namespace_key(&obj)?;
        let mut guard = self.inner.state.lock();
        let MirrorState { objects, handlers } = &mut *guard;
        match objects.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(obj);
                debug!(%key, "Mirror update");
                for handler in handlers.iter() {
                    handler.on_update(&old, entry.get());
                }
            }
            Entry::Vacant(entry) => {
                let new = entry.insert(obj);
                debug!(%key, "Mirror add");
                for handler in handlers.iter() {
                    handler.on_add(new);
                }
            }
        }
        Ok(key)
    }

    /// Remove the object stored under `key`, notifying handlers.
    ///
    /// Returns `false` if nothing was stored under `key`.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        let Some(old) = state.objects.remove(key) else {
            return false;
        };
        debug!(%key, "Mirror delete");
        let deleted = DeletedObject::Object(old);
        for handler in &state.handlers {
            handler.on_delete(&deleted);
        }
        true
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().objects.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declare the initial state fully mirrored.
    pub fn mark_synced(&self) {
        self.inner.synced.store(true, Ordering::Release);
    }
}

impl ChangeSource for MemorySource {
    fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        let mut state = self.inner.state.lock();
        for obj in state.objects.values() {
            handler.on_add(obj);
        }
        state.handlers.push(handler);
    }

    fn has_synced(&self) -> bool {
        self.inner.synced.load(Ordering::Acquire)
    }
}
