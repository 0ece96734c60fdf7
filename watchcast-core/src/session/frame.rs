//! Transport-neutral WebSocket frames.
//!
//! The session loops read a `Stream` of [`Frame`]s and write to a `Sink` of
//! [`Frame`]s. The server maps its WebSocket implementation onto these.

use bytes::Bytes;

/// Close code and reason sent in a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

impl Frame {
    /// Size of the frame payload in bytes.
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close(frame) => frame.as_ref().map_or(0, |f| 2 + f.reason.len()),
        }
    }
}
