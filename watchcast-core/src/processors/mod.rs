//! Event processors for the watch-to-broadcast pipeline.
//!
//! - `DispatchWorker`: pulls events from the `RetryingQueue` and hands them
//!   to an [`EventReceiver`], retrying failures with backoff
//! - `Broadcaster`: the receiver that fans events out to matching sessions

pub mod broadcaster;
pub mod dispatch_worker;

pub use broadcaster::Broadcaster;
pub use dispatch_worker::{DispatchOutcome, DispatchWorker};

use async_trait::async_trait;
use thiserror::Error;

use crate::events::Event;

/// Errors a receiver may report for an event. Every variant is retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event could not be serialized for the wire.
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Receiver-specific failure.
    #[error("receiver error: {0}")]
    Receiver(String),
}

/// Consumer of dispatched events.
#[async_trait]
pub trait EventReceiver: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), DispatchError>;
}
