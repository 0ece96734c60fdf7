//! Wire types for the watchcast resource change stream.
//!
//! The [`objects`] module holds everything that crosses the wire between the
//! server and a UI client. The optional [`client`] module (cargo feature
//! `client`) implements the client side of the WebSocket protocol.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
