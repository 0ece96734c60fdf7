//! Canonical events and their translation from change notifications.
//!
//! # Event Flow
//!
//! 1. A change source calls the [`EventTranslator`] with an add, update or
//!    delete notification.
//! 2. The translator derives namespace and name from the object's key and
//!    enqueues an [`Event`] on the retrying queue.
//! 3. Dispatch workers hand events to the broadcaster, which fans them out to
//!    matching sessions.
//!
//! Events carry the latest snapshot known at enqueue time. Same-key events
//! still pending in the queue are coalesced.

pub mod key;
pub mod translator;
pub mod types;

pub use key::{KeyError, deletion_handling_key, meta_namespace_key, split_meta_namespace_key};
pub use translator::{EventTranslator, translate};
pub use types::{Event, EventKey, EventType};
