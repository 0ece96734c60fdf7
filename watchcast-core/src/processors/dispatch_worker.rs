//! DispatchWorker processor.
//!
//! The DispatchWorker is responsible for:
//! - Pulling events from the `RetryingQueue`
//! - Handing each event to an `EventReceiver`
//! - Re-queueing failed events with exponential backoff
//! - Dropping events that keep failing once the retry limit is reached

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::EventReceiver;
use crate::events::EventKey;
use crate::queue::{QueueItem, RetryingQueue};

/// What happened to one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The receiver accepted the event; its failure count was cleared.
    Delivered,
    /// The receiver failed; the event was scheduled for its `retry`-th retry.
    Retrying { retry: u32 },
    /// The receiver failed after `retries` retries; the event was discarded.
    Dropped { retries: u32 },
}

/// Consumes a [`RetryingQueue`] and dispatches events to a receiver.
pub struct DispatchWorker<R: ?Sized> {
    id: usize,
    queue: RetryingQueue,
    receiver: Arc<R>,
    max_retries: u32,
}

impl<R: EventReceiver + ?Sized> DispatchWorker<R> {
    /// Create a new DispatchWorker.
    ///
    /// # Arguments
    ///
    /// * `id` - Worker index, used in logs
    /// * `queue` - Queue to consume
    /// * `receiver` - Receiver every event is handed to
    /// * `max_retries` - Retries granted before an event is dropped
    pub fn new(id: usize, queue: RetryingQueue, receiver: Arc<R>, max_retries: u32) -> Self {
        Self {
            id,
            queue,
            receiver,
            max_retries,
        }
    }

    /// Run until the queue is shut down and drained.
    pub async fn run(self) {
        info!(worker = self.id, "DispatchWorker started");
        while self.process_next().await.is_some() {}
        info!(worker = self.id, "DispatchWorker shutdown complete");
    }

    /// Wait for one event and process it.
    ///
    /// Returns `None` once the queue is shut down and empty.
    pub async fn process_next(&self) -> Option<DispatchOutcome> {
        let item = self.queue.get().await?;
        let key = item.key();
        let outcome = self.process(&key, item).await;
        self.queue.done(&key);
        Some(outcome)
    }

    async fn process(&self, key: &EventKey, item: QueueItem) -> DispatchOutcome {
        debug!(worker = self.id, %key, event_type = %item.event.event_type, "Dispatching event");

        let err = match self.receiver.handle_event(&item.event).await {
            Ok(()) => {
                self.queue.forget(key);
                return DispatchOutcome::Delivered;
            }
            Err(e) => e,
        };

        if item.retries < self.max_retries {
            let retry = item.retries + 1;
            warn!(
                worker = self.id,
                %key,
                error = %err,
                retry,
                "Failed to dispatch event, retrying"
            );
            self.queue.add_rate_limited(item.event);
            DispatchOutcome::Retrying { retry }
        } else {
            error!(
                worker = self.id,
                %key,
                error = %err,
                retries = item.retries,
                "Dropping event after exhausting retries"
            );
            self.queue.forget(key);
            DispatchOutcome::Dropped {
                retries: item.retries,
            }
        }
    }
}
