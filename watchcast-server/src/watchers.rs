//! One watch pipeline per configured resource type.
//!
//! Every pipeline mirrors its resource type in a `MemorySource` and feeds a
//! single shared `Broadcaster`, so all resource types reach the same sessions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use watchcast_core::config::QueueConfig;
use watchcast_core::processors::Broadcaster;
use watchcast_core::session::SessionRegistry;
use watchcast_core::source::MemorySource;
use watchcast_core::WatchPipeline;

pub struct Watchers {
    sources: Arc<HashMap<String, MemorySource>>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Watchers {
    /// Start a pipeline for each resource type and mark its mirror synced.
    pub fn start(resources: &[String], queue: &QueueConfig, registry: &SessionRegistry) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let shutdown = CancellationToken::new();
        let mut sources = HashMap::with_capacity(resources.len());
        let mut handles = Vec::with_capacity(resources.len());

        for resource_type in resources {
            let source = MemorySource::new();
            let pipeline = WatchPipeline::new(resource_type.clone(), broadcaster.clone(), queue.clone());
            let task_source = source.clone();
            let task_shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = pipeline.run(&task_source, task_shutdown).await {
                    tracing::error!(error = %e, "Watch pipeline stopped");
                }
            }));

            // The mirror starts empty, so it is in sync immediately.
            source.mark_synced();
            sources.insert(resource_type.clone(), source);
        }

        tracing::info!(resources = ?resources, "Watch pipelines started");
        Self {
            sources: Arc::new(sources),
            shutdown,
            handles,
        }
    }

    pub fn sources(&self) -> Arc<HashMap<String, MemorySource>> {
        self.sources.clone()
    }

    /// Stop every pipeline and wait for their queues to drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Watch pipeline task panicked");
            }
        }
        tracing::info!("Watch pipelines stopped");
    }
}
