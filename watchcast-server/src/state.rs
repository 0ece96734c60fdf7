//! Application state shared across all request handlers.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use watchcast_core::config::SessionConfig;
use watchcast_core::session::SessionRegistry;
use watchcast_core::source::MemorySource;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Open sessions, shared with the broadcaster.
    pub registry: SessionRegistry,
    /// Tunables for new sessions (can be reloaded via SIGHUP).
    pub session_config: Arc<RwLock<SessionConfig>>,
    /// Resource mirrors keyed by resource type.
    pub sources: Arc<HashMap<String, MemorySource>>,
}

impl AppState {
    pub fn new(
        registry: SessionRegistry,
        session_config: SessionConfig,
        sources: Arc<HashMap<String, MemorySource>>,
    ) -> Self {
        Self {
            registry,
            session_config: Arc::new(RwLock::new(session_config)),
            sources,
        }
    }

    /// Snapshot of the current session tunables.
    pub async fn session_config(&self) -> SessionConfig {
        self.session_config.read().await.clone()
    }

    /// Update the session tunables (used during SIGHUP reload).
    pub async fn update_session_config(&self, config: SessionConfig) {
        *self.session_config.write().await = config;
    }
}
