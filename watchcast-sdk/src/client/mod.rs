//! WebSocket client for the resource change stream.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `tokio-tungstenite`.

mod watch;

pub use watch::{WatchClient, WatchOptions};

use tokio_tungstenite::tungstenite;

/// Errors produced by the SDK client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure such as a refused or reset connection.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// A data frame could not be decoded as an event.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The identity is not a valid header value.
    #[error("invalid identity: {0}")]
    Identity(#[from] tungstenite::http::header::InvalidHeaderValue),
}
