use futures_util::{Sink, Stream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use watchcast_sdk::objects::SessionSummary;

use super::{Control, Frame, Session, SessionId, reader, writer};
use crate::config::SessionConfig;

/// Buffered heartbeat replies; the reader waits for room when full.
const CONTROL_BUFFER: usize = 4;

/// Registry of open sessions.
///
/// Constructed once and shared by the handshake handler and the broadcaster.
/// Cheap to clone; clones share the same sessions.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl RegistryInner {
    pub(super) fn remove(&self, id: &SessionId) {
        self.sessions.lock().remove(id);
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session over a split connection and start its reader
    /// and writer tasks.
    pub fn subscribe<R, E, W>(
        &self,
        identity: impl Into<String>,
        namespace: impl Into<String>,
        config: &SessionConfig,
        stream: R,
        sink: W,
    ) -> Arc<Session>
    where
        R: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
        W: Sink<Frame> + Unpin + Send + 'static,
        W::Error: Display + Send,
    {
        let (session, mailbox) = self.register(identity.into(), namespace.into(), config);
        let (control_tx, control_rx) = mpsc::channel::<Control>(CONTROL_BUFFER);

        tokio::spawn(reader::read_loop(
            session.clone(),
            stream,
            control_tx,
            config.clone(),
        ));
        tokio::spawn(writer::write_loop(
            session.clone(),
            sink,
            mailbox,
            control_rx,
            config.clone(),
        ));

        info!(
            session_id = %session.id(),
            identity = %session.identity(),
            namespace = %session.namespace(),
            "Session opened"
        );
        session
    }

    fn register(
        &self,
        identity: String,
        namespace: String,
        config: &SessionConfig,
    ) -> (Arc<Session>, mpsc::Receiver<String>) {
        let (session, mailbox) = Session::new(
            identity,
            namespace,
            config,
            CancellationToken::new(),
            Arc::downgrade(&self.inner),
        );
        let session = Arc::new(session);
        self.inner
            .sessions
            .lock()
            .insert(session.id(), session.clone());
        (session, mailbox)
    }

    /// Register a session without a connection, handing back its mailbox.
    #[cfg(test)]
    pub(crate) fn register_detached(
        &self,
        identity: &str,
        namespace: &str,
        config: &SessionConfig,
    ) -> (Arc<Session>, mpsc::Receiver<String>) {
        self.register(identity.to_string(), namespace.to_string(), config)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.inner.sessions.lock().get(id).cloned()
    }

    /// Snapshot of the open sessions subscribed to `namespace`.
    pub fn matching(&self, namespace: &str) -> Vec<Arc<Session>> {
        self.inner
            .sessions
            .lock()
            .values()
            .filter(|session| session.matches(namespace))
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self
            .inner
            .sessions
            .lock()
            .values()
            .map(|session| session.summary())
            .collect();
        summaries.sort_by_key(|summary| summary.connected_at);
        summaries
    }

    /// Close the session with the given id.
    ///
    /// Returns `false` if no such session is open.
    pub fn close(&self, id: &SessionId) -> bool {
        // Looked up first: closing removes the session from the map.
        match self.get(id) {
            Some(session) => session.close(),
            None => false,
        }
    }

    /// Close every open session.
    pub fn close_all(&self) {
        let sessions: Vec<_> = self.inner.sessions.lock().values().cloned().collect();
        info!(count = sessions.len(), "Closing all sessions");
        for session in sessions {
            session.close();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_filters_by_namespace() {
        let registry = SessionRegistry::new();
        let config = SessionConfig::default();
        let (ns1, _rx1) = registry.register_detached("alice", "ns1", &config);
        let (_ns2, _rx2) = registry.register_detached("bob", "ns2", &config);

        let matching = registry.matching("ns1");
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id(), ns1.id());
        assert!(registry.matching("ns3").is_empty());
    }

    #[test]
    fn test_list_and_close_by_id() {
        let registry = SessionRegistry::new();
        let config = SessionConfig::default();
        let (session, _rx) = registry.register_detached("alice", "default", &config);

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, session.id());
        assert_eq!(listed[0].identity, "alice");
        assert_eq!(listed[0].namespace, "default");

        assert!(registry.close(&session.id()));
        assert!(!registry.close(&session.id()));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_close_all() {
        let registry = SessionRegistry::new();
        let config = SessionConfig::default();
        let (a, _rx_a) = registry.register_detached("alice", "ns1", &config);
        let (b, _rx_b) = registry.register_detached("bob", "ns2", &config);

        registry.close_all();
        assert!(registry.is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
    }
}
