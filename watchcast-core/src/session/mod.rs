//! Client sessions.
//!
//! A session is one connected UI client: an identity, a namespace filter, a
//! bounded outbound mailbox and a connection. The connection is split into a
//! read half and a write half, each driven by its own task:
//!
//! - the reader enforces the idle deadline (reset by pongs), the inbound size
//!   cap, and answers application heartbeats;
//! - the writer drains the mailbox, emits periodic pings and is the only code
//!   that ever writes to the connection.
//!
//! Both tasks share one cancellation scope. Whichever side fails first closes
//! the session, which cancels the scope and stops the other side.
//!
//! # Lifecycle
//!
//! `Open` → `Closing` → `Closed`. [`Session::close`] is guarded so the
//! transition runs exactly once no matter how many tasks race to close.

mod frame;
mod reader;
mod registry;
mod writer;

pub use frame::{CloseFrame, Frame};
pub use registry::SessionRegistry;

use parking_lot::Mutex;
use std::sync::Weak;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use watchcast_sdk::objects::SessionSummary;
use watchcast_sdk::objects::ws::WsCloseCode;

use crate::config::SessionConfig;
use registry::RegistryInner;

pub type SessionId = Uuid;

/// Failure of a session's connection. Never retried: the client reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("no pong received within {0:?}")]
    IdleTimeout(Duration),

    #[error("message of {size} bytes exceeds the limit of {limit}")]
    MessageTooBig { size: usize, limit: usize },

    #[error("connection closed by peer")]
    PeerClosed,

    #[error("mailbox stayed full for {0:?}")]
    SlowConsumer(Duration),
}

/// Why a session was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Administrative close or server shutdown.
    Requested,
    Transport(TransportError),
}

impl CloseReason {
    /// Close frame sent to the client, if the connection is still usable.
    pub fn close_frame(&self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            CloseReason::Requested => (WsCloseCode::NORMAL, "closed"),
            CloseReason::Transport(TransportError::IdleTimeout(_)) => {
                (WsCloseCode::IDLE_TIMEOUT, "idle timeout")
            }
            CloseReason::Transport(TransportError::MessageTooBig { .. }) => {
                (WsCloseCode::MESSAGE_TOO_BIG, "message too big")
            }
            CloseReason::Transport(TransportError::SlowConsumer(_)) => {
                (WsCloseCode::SLOW_CONSUMER, "slow consumer")
            }
            CloseReason::Transport(_) => return None,
        };
        Some(CloseFrame {
            code,
            reason: reason.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Control messages from the reader to the writer.
#[derive(Debug, Clone, Copy)]
enum Control {
    HeartbeatReply { binary: bool },
}

/// One connected client.
pub struct Session {
    id: SessionId,
    identity: String,
    namespace: String,
    connected_at: time::OffsetDateTime,
    mailbox: mpsc::Sender<String>,
    send_timeout: Duration,
    state: AtomicU8,
    close_reason: Mutex<Option<CloseReason>>,
    cancel: CancellationToken,
    registry: Weak<RegistryInner>,
}

impl Session {
    fn new(
        identity: String,
        namespace: String,
        config: &SessionConfig,
        cancel: CancellationToken,
        registry: Weak<RegistryInner>,
    ) -> (Self, mpsc::Receiver<String>) {
        let (mailbox, mailbox_rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let session = Self {
            id: Uuid::new_v4(),
            identity,
            namespace,
            connected_at: time::OffsetDateTime::now_utc(),
            mailbox,
            send_timeout: config.idle_timeout,
            state: AtomicU8::new(OPEN),
            close_reason: Mutex::new(None),
            cancel,
            registry,
        };
        (session, mailbox_rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The namespace this session is subscribed to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connected_at(&self) -> time::OffsetDateTime {
        self.connected_at
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            OPEN => SessionState::Open,
            CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.lock().clone()
    }

    /// Whether events for `namespace` should be delivered to this session.
    pub fn matches(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }

    /// Offer `payload` to the mailbox.
    ///
    /// Waits up to the idle timeout for room. If the mailbox stays full the
    /// session is closed as a slow consumer and `false` is returned. Also
    /// returns `false` if the session is not open.
    pub async fn send(&self, payload: String) -> bool {
        if !self.is_open() {
            return false;
        }
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            result = self.mailbox.send_timeout(payload, self.send_timeout) => result,
        };
        match result {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    session_id = %self.id,
                    identity = %self.identity,
                    timeout = ?self.send_timeout,
                    "Mailbox full, dropping slow consumer"
                );
                self.close_with(CloseReason::Transport(TransportError::SlowConsumer(
                    self.send_timeout,
                )));
                false
            }
            Err(SendTimeoutError::Closed(_)) => {
                self.close_with(CloseReason::Transport(TransportError::PeerClosed));
                false
            }
        }
    }

    /// Close the session. Safe to call any number of times.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.close_with(CloseReason::Requested)
    }

    pub(crate) fn close_with(&self, reason: CloseReason) -> bool {
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        *self.close_reason.lock() = Some(reason.clone());
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
        self.cancel.cancel();
        self.state.store(CLOSED, Ordering::Release);

        info!(
            session_id = %self.id,
            identity = %self.identity,
            namespace = %self.namespace,
            reason = ?reason,
            "Session closed"
        );
        true
    }

    /// Wait until the session is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            identity: self.identity.clone(),
            namespace: self.namespace.clone(),
            connected_at: self.connected_at.unix_timestamp(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("namespace", &self.namespace)
            .field("state", &self.state())
            .finish()
    }
}
