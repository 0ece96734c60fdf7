//! WebSocket protocol constants for the resource change stream.
//!
//! The `GET /ws?namespace=<ns>` endpoint upgrades to a WebSocket
//! connection scoped to a single namespace.
//!
//! # Protocol
//!
//! 1. The server pushes one serialized [`Event`](super::Event) per text
//!    frame for every change in the subscribed namespace.
//! 2. The client may send the single byte [`HEARTBEAT_REQUEST`] at any time;
//!    the server answers with [`HEARTBEAT_REPLY`] in the same frame kind.
//!    Every request gets exactly one reply, in order; a burst of requests
//!    is throttled rather than dropped. Any other client payload is ignored.
//! 3. The server sends a transport ping every `0.9 * idle_timeout` and
//!    closes the connection if no pong arrives within `idle_timeout`.
//! 4. Client messages larger than [`MAX_CLIENT_MESSAGE_SIZE`] close the
//!    connection.
//!
//! Missed events are never replayed. A client that is disconnected must
//! reconnect and re-read current state through other means.

/// Application heartbeat sent by the client (`'1'`).
pub const HEARTBEAT_REQUEST: u8 = 0x31;

/// Application heartbeat reply sent by the server (`'0'`).
pub const HEARTBEAT_REPLY: u8 = 0x30;

/// Largest message the server accepts from a client, in bytes.
pub const MAX_CLIENT_MESSAGE_SIZE: usize = 1024;

/// Query parameter carrying the namespace filter on the handshake.
pub const NAMESPACE_QUERY_PARAM: &str = "namespace";

/// Header carrying the caller identity on the handshake.
pub const IDENTITY_HEADER: &str = "X-Remote-User";

/// Returns `true` if `payload` is exactly the client heartbeat byte.
pub fn is_heartbeat_request(payload: &[u8]) -> bool {
    payload == [HEARTBEAT_REQUEST]
}

/// Well-known WebSocket close codes used by the change stream.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure (administrative close or server shutdown).
    pub const NORMAL: u16 = 1000;

    /// The client sent a message larger than [`MAX_CLIENT_MESSAGE_SIZE`].
    pub const MESSAGE_TOO_BIG: u16 = 1009;

    /// The client did not answer pings within the idle timeout.
    pub const IDLE_TIMEOUT: u16 = 4008;

    /// The client could not keep up with the event stream.
    pub const SLOW_CONSUMER: u16 = 4029;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_detection() {
        assert!(is_heartbeat_request(b"1"));
        assert!(!is_heartbeat_request(b"0"));
        assert!(!is_heartbeat_request(b"11"));
        assert!(!is_heartbeat_request(b""));
    }
}
