//! Per-key capped exponential backoff.

use std::collections::HashMap;
use std::time::Duration;

use crate::events::EventKey;

/// Tracks failures per key and computes `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    failures: HashMap<EventKey, u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// Record one more failure for `key` and return how long to wait before
    /// retrying it.
    pub fn when(&mut self, key: &EventKey) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let delay = calculate_backoff(self.base, self.max, *failures);
        *failures += 1;
        delay
    }

    /// Number of failures recorded for `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &EventKey) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, key: &EventKey) {
        self.failures.remove(key);
    }
}

/// `base * 2^failures`, capped at `max`.
pub fn calculate_backoff(base: Duration, max: Duration, failures: u32) -> Duration {
    // 2^62 already exceeds any sensible cap.
    let factor = 1u128 << failures.min(62);
    let nanos = base.as_nanos().saturating_mul(factor);
    if nanos >= max.as_nanos() {
        return max;
    }
    u64::try_from(nanos).map(Duration::from_nanos).unwrap_or(max)
}
