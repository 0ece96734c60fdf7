//! Configuration types for the watch pipeline and client sessions.
//!
//! These types represent validated runtime configuration and can be shared
//! across crates. Loading and parsing is handled by the server crate.

mod queue;
mod session;

pub use queue::QueueConfig;
pub use session::SessionConfig;
