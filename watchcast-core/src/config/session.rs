//! Client session configuration.

use std::time::Duration;

/// Tunables applied to every session at handshake time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Read deadline without a pong, and the longest `Session::send` waits
    /// on a full mailbox before the session counts as a slow consumer.
    pub idle_timeout: Duration,
    /// Deadline for writing a single frame (data or ping).
    pub write_timeout: Duration,
    /// Fixed capacity of the outbound mailbox.
    pub mailbox_capacity: usize,
    /// Largest inbound message accepted from the client, in bytes.
    pub max_message_size: usize,
}

impl SessionConfig {
    /// Interval between transport pings, 0.9 of the idle timeout.
    pub fn ping_period(&self) -> Duration {
        self.idle_timeout.mul_f64(0.9)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(55),
            write_timeout: Duration::from_secs(10),
            mailbox_capacity: 256,
            max_message_size: watchcast_sdk::objects::ws::MAX_CLIENT_MESSAGE_SIZE,
        }
    }
}
