//! Broadcaster processor.
//!
//! The Broadcaster is responsible for:
//! - Receiving dispatched `Event`s from the `DispatchWorker`
//! - Serializing each event once
//! - Offering it to every open session subscribed to the event's namespace
//!
//! Sends run concurrently, so a slow session delays the worker by at most
//! one mailbox wait bound and never delays delivery to the other sessions.
//! A session whose mailbox stays full is closed by `Session::send`.

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};

use super::{DispatchError, EventReceiver};
use crate::events::Event;
use crate::session::SessionRegistry;

pub struct Broadcaster {
    registry: SessionRegistry,
}

impl Broadcaster {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Offer `event` to every matching session.
    ///
    /// Returns the number of sessions that accepted it.
    pub async fn broadcast(&self, event: &Event) -> Result<usize, DispatchError> {
        let targets = self.registry.matching(&event.namespace);
        if targets.is_empty() {
            debug!(
                namespace = %event.namespace,
                resource_type = %event.resource_type,
                name = %event.resource_name,
                "No sessions subscribed to namespace"
            );
            return Ok(0);
        }

        let payload = serde_json::to_string(event)?;
        let sends = targets.iter().map(|session| {
            let payload = payload.clone();
            async move { (session, session.send(payload).await) }
        });

        let mut delivered = 0;
        for (session, accepted) in join_all(sends).await {
            if accepted {
                delivered += 1;
            } else {
                warn!(
                    session_id = %session.id(),
                    identity = %session.identity(),
                    resource_type = %event.resource_type,
                    name = %event.resource_name,
                    "Event not delivered to session"
                );
            }
        }

        debug!(
            namespace = %event.namespace,
            resource_type = %event.resource_type,
            name = %event.resource_name,
            event_type = %event.event_type,
            delivered,
            targets = targets.len(),
            "Broadcast event"
        );
        Ok(delivered)
    }
}

#[async_trait]
impl EventReceiver for Broadcaster {
    async fn handle_event(&self, event: &Event) -> Result<(), DispatchError> {
        self.broadcast(event).await.map(|_| ())
    }
}
