//! The watch pipeline for one resource type.
//!
//! `change source -> EventTranslator -> RetryingQueue -> DispatchWorker(s) -> receiver`
//!
//! A pipeline is stopped by a single shutdown token. Sessions are not tied
//! to it: several pipelines usually feed one shared session registry.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::QueueConfig;
use crate::events::EventTranslator;
use crate::processors::{DispatchWorker, EventReceiver};
use crate::queue::RetryingQueue;
use crate::source::ChangeSource;

/// How often `has_synced` is polled while waiting for the source.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("shutdown requested before the {0} source finished syncing")]
    SyncAborted(String),
}

pub struct WatchPipeline<R: ?Sized> {
    resource_type: String,
    queue: RetryingQueue,
    receiver: Arc<R>,
    config: QueueConfig,
}

impl<R: EventReceiver + ?Sized + 'static> WatchPipeline<R> {
    pub fn new(resource_type: impl Into<String>, receiver: Arc<R>, config: QueueConfig) -> Self {
        Self {
            resource_type: resource_type.into(),
            queue: RetryingQueue::new(&config),
            receiver,
            config,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Handle to the pipeline's queue.
    pub fn queue(&self) -> RetryingQueue {
        self.queue.clone()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Registers a translator with `source`, waits for the source to sync,
    /// then dispatches events. On shutdown the queue stops accepting events
    /// and this returns once the workers have drained it.
    pub async fn run<S>(self, source: &S, shutdown: CancellationToken) -> Result<(), PipelineError>
    where
        S: ChangeSource + ?Sized,
    {
        let translator = EventTranslator::new(self.resource_type.clone(), self.queue.clone());
        source.add_event_handler(Arc::new(translator));

        if !wait_for_sync(source, &shutdown).await {
            self.queue.shut_down();
            error!(resource_type = %self.resource_type, "Source did not sync before shutdown");
            return Err(PipelineError::SyncAborted(self.resource_type));
        }

        let workers: Vec<_> = (0..self.config.workers.max(1))
            .map(|id| {
                let worker = DispatchWorker::new(
                    id,
                    self.queue.clone(),
                    self.receiver.clone(),
                    self.config.max_retries,
                );
                tokio::spawn(worker.run())
            })
            .collect();
        info!(
            resource_type = %self.resource_type,
            workers = workers.len(),
            "WatchPipeline started"
        );

        shutdown.cancelled().await;
        info!(resource_type = %self.resource_type, "WatchPipeline received shutdown signal");
        self.queue.shut_down();

        for handle in workers {
            if let Err(e) = handle.await {
                error!(resource_type = %self.resource_type, error = %e, "DispatchWorker panicked");
            }
        }

        info!(resource_type = %self.resource_type, "WatchPipeline shutdown complete");
        Ok(())
    }
}

/// Returns `false` if `shutdown` fired first.
async fn wait_for_sync<S>(source: &S, shutdown: &CancellationToken) -> bool
where
    S: ChangeSource + ?Sized,
{
    let mut poll = tokio::time::interval(SYNC_POLL_INTERVAL);
    loop {
        if source.has_synced() {
            return true;
        }
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return false,
            _ = poll.tick() => {}
        }
    }
}
