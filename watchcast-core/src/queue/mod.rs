//! Deduplicating, rate-limited queue of pending events.
//!
//! The queue holds at most one pending event per [`EventKey`]. Adding an
//! event for a key that is already pending replaces the pending event, so a
//! worker only ever sees the most recent state of a resource. A key that is
//! being processed is never handed to a second worker: new events for it are
//! parked and re-queued when the first worker calls [`RetryingQueue::done`].
//!
//! Every [`RetryingQueue::add`] stamps the key with a fresh generation. A
//! retry only re-enters the queue if its key is still at the generation of
//! the failed event, so a retry never resurrects a state older than one that
//! was added, processed or delivered since.

mod rate_limiter;

pub use rate_limiter::{ExponentialBackoff, calculate_backoff};

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::QueueConfig;
use crate::events::{Event, EventKey};

/// An event handed out by [`RetryingQueue::get`].
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub event: Event,
    /// Failed attempts recorded for this key so far.
    pub retries: u32,
}

impl QueueItem {
    pub fn key(&self) -> EventKey {
        EventKey::of(&self.event)
    }
}

/// Shared handle to a retrying event queue.
///
/// Cheap to clone; clones operate on the same queue.
#[derive(Clone)]
pub struct RetryingQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    /// Cancelled on shutdown to abandon pending backoff re-adds.
    shutdown: CancellationToken,
}

struct QueueState {
    /// Keys ready to be handed out, in FIFO order.
    queue: VecDeque<EventKey>,
    /// Latest event for every key that still needs processing.
    dirty: HashMap<EventKey, Event>,
    /// Keys currently held by a worker, with the generation handed out.
    processing: HashMap<EventKey, u64>,
    /// Generation of the latest event added for each key.
    generations: HashMap<EventKey, u64>,
    next_generation: u64,
    backoff: ExponentialBackoff,
    shutting_down: bool,
}

impl QueueState {
    fn generation(&self, key: &EventKey) -> u64 {
        self.generations.get(key).copied().unwrap_or_default()
    }
}

impl RetryingQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashMap::new(),
                    processing: HashMap::new(),
                    generations: HashMap::new(),
                    next_generation: 0,
                    backoff: ExponentialBackoff::new(config.base_delay, config.max_delay),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Enqueue `event`, coalescing it with a pending event for the same key.
    ///
    /// Ignored after [`shut_down`](RetryingQueue::shut_down).
    pub fn add(&self, event: Event) {
        let key = EventKey::of(&event);
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            debug!(%key, "Queue is shutting down, dropping event");
            return;
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state.generations.insert(key.clone(), generation);
        self.enqueue(&mut state, key, event);
    }

    /// Re-enqueue `event` after a backoff and count one more failure for its
    /// key.
    ///
    /// If a newer event for the key was added in the meantime, `event` is
    /// discarded when the backoff elapses.
    pub fn add_rate_limited(&self, event: Event) {
        let key = EventKey::of(&event);
        let (delay, generation) = {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            let generation = match state.processing.get(&key) {
                Some(generation) => *generation,
                None => state.generation(&key),
            };
            (state.backoff.when(&key), generation)
        };
        debug!(%key, ?delay, "Scheduling retry");

        let queue = self.clone();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => queue.requeue(event, generation),
            }
        });
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is shut down and empty. Every returned
    /// item must be released with [`done`](RetryingQueue::done).
    pub async fn get(&self) -> Option<QueueItem> {
        loop {
            // Registered before inspecting the state so a concurrent add or
            // shutdown cannot slip between the check and the wait.
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                while let Some(key) = state.queue.pop_front() {
                    let Some(event) = state.dirty.remove(&key) else {
                        continue;
                    };
                    let retries = state.backoff.num_requeues(&key);
                    let generation = state.generation(&key);
                    state.processing.insert(key, generation);
                    if !state.queue.is_empty() {
                        self.inner.notify.notify_one();
                    }
                    return Some(QueueItem { event, retries });
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Release a key handed out by [`get`](RetryingQueue::get).
    ///
    /// If the key was re-added while it was being processed, it becomes
    /// available again.
    pub fn done(&self, key: &EventKey) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains_key(key) {
            state.queue.push_back(key.clone());
            self.inner.notify.notify_one();
        }
    }

    /// Clear the failure count of a key.
    ///
    /// Retries still pending for the key will be discarded.
    pub fn forget(&self, key: &EventKey) {
        let mut state = self.inner.state.lock();
        state.backoff.forget(key);
        if !state.dirty.contains_key(key) {
            state.generations.remove(key);
        }
    }

    pub fn num_requeues(&self, key: &EventKey) -> u32 {
        self.inner.state.lock().backoff.num_requeues(key)
    }

    /// Stop accepting events and wake every waiting [`get`](RetryingQueue::get).
    ///
    /// Events already queued are still handed out; pending retries are
    /// abandoned.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.shutdown.cancel();
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    /// Number of keys ready to be handed out.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-add a retried event unless its key moved past `generation`.
    fn requeue(&self, event: Event, generation: u64) {
        let key = EventKey::of(&event);
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            debug!(%key, "Queue is shutting down, dropping retry");
            return;
        }
        if state.generation(&key) != generation || state.dirty.contains_key(&key) {
            debug!(%key, "Retry superseded by a newer event");
            return;
        }
        self.enqueue(&mut state, key, event);
    }

    fn enqueue(&self, state: &mut QueueState, key: EventKey, event: Event) {
        if state.dirty.insert(key.clone(), event).is_some() || state.processing.contains_key(&key)
        {
            return;
        }
        state.queue.push_back(key);
        self.inner.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use serde_json::json;
    use std::time::Duration;

    fn event(name: &str, event_type: EventType, version: u32) -> Event {
        Event {
            resource_name: name.to_string(),
            event_type,
            namespace: "default".to_string(),
            resource_type: "pods".to_string(),
            item: json!({ "version": version }),
        }
    }

    fn queue() -> RetryingQueue {
        RetryingQueue::new(&QueueConfig::default())
    }

    #[tokio::test]
    async fn test_same_key_is_coalesced_to_latest() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        queue.add(event("pod-a", EventType::Update, 2));
        assert_eq!(queue.len(), 1);

        let item = queue.get().await.unwrap();
        assert_eq!(item.event.item["version"], 2);
        queue.done(&item.key());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_keep_fifo_order() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Create, 1));
        queue.add(event("pod-b", EventType::Create, 1));
        queue.add(event("pod-a", EventType::Delete, 2));

        let first = queue.get().await.unwrap();
        let second = queue.get().await.unwrap();
        assert_eq!(first.event.resource_name, "pod-a");
        assert_eq!(first.event.event_type, EventType::Delete);
        assert_eq!(second.event.resource_name, "pod-b");
    }

    #[tokio::test]
    async fn test_add_while_processing_is_reprocessed_after_done() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        let item = queue.get().await.unwrap();

        queue.add(event("pod-a", EventType::Update, 2));
        // Not handed out while the first one is in flight.
        assert!(queue.is_empty());

        queue.done(&item.key());
        assert_eq!(queue.len(), 1);
        let again = queue.get().await.unwrap();
        assert_eq!(again.event.item["version"], 2);
    }

    #[tokio::test]
    async fn test_get_blocks_until_add() {
        let queue = queue();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.add(event("pod-a", EventType::Create, 1));

        let item = waiter.await.unwrap().unwrap();
        assert_eq!(item.event.resource_name, "pod-a");
    }

    #[tokio::test]
    async fn test_shut_down_unblocks_get() {
        let queue = queue();
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.shut_down();

        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shut_down_drains_queued_items() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Create, 1));
        queue.shut_down();
        queue.add(event("pod-b", EventType::Create, 1));

        let item = queue.get().await.unwrap();
        assert_eq!(item.event.resource_name, "pod-a");
        assert!(queue.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_add_increments_retries() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Create, 1));

        let item = queue.get().await.unwrap();
        assert_eq!(item.retries, 0);
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());
        // Still backing off.
        assert!(queue.is_empty());

        let retried = queue.get().await.unwrap();
        assert_eq!(retried.retries, 1);
        queue.add_rate_limited(retried.event.clone());
        queue.done(&retried.key());

        let retried = queue.get().await.unwrap();
        assert_eq!(retried.retries, 2);

        queue.forget(&retried.key());
        assert_eq!(queue.num_requeues(&retried.key()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_does_not_overwrite_newer_event() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        let item = queue.get().await.unwrap();
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());

        queue.add(event("pod-a", EventType::Update, 2));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(queue.len(), 1);
        let item = queue.get().await.unwrap();
        assert_eq!(item.event.item["version"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_discarded_after_newer_event_was_delivered() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        let item = queue.get().await.unwrap();
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());

        queue.add(event("pod-a", EventType::Update, 2));
        let newer = queue.get().await.unwrap();
        assert_eq!(newer.event.item["version"], 2);
        queue.forget(&newer.key());
        queue.done(&newer.key());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_discarded_while_newer_event_is_processing() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        let item = queue.get().await.unwrap();
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());

        queue.add(event("pod-a", EventType::Update, 2));
        let newer = queue.get().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        queue.done(&newer.key());
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_newer_event_outlives_older_retry() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Update, 1));
        let item = queue.get().await.unwrap();
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());

        queue.add(event("pod-a", EventType::Update, 2));
        let newer = queue.get().await.unwrap();
        queue.add_rate_limited(newer.event.clone());
        queue.done(&newer.key());

        let retried = queue.get().await.unwrap();
        assert_eq!(retried.event.item["version"], 2);
        queue.done(&retried.key());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shut_down_abandons_pending_retries() {
        let queue = queue();
        queue.add(event("pod-a", EventType::Create, 1));
        let item = queue.get().await.unwrap();
        queue.add_rate_limited(item.event.clone());
        queue.done(&item.key());

        queue.shut_down();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(queue.get().await.is_none());
    }
}
