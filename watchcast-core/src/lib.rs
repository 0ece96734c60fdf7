#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod events;
pub mod pipeline;
pub mod processors;
pub mod queue;
pub mod session;
pub mod source;

pub use pipeline::{PipelineError, WatchPipeline};
