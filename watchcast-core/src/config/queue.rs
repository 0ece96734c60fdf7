//! Retrying queue and dispatch worker configuration.

use std::time::Duration;

/// Tunables for one watch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Retries granted to a failing event before it is dropped.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on every further failure.
    pub base_delay: Duration,
    /// Upper bound of the backoff.
    pub max_delay: Duration,
    /// Number of dispatch workers consuming the queue.
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
            workers: 1,
        }
    }
}
