//! Retry policy: exponential backoff between attempts.

use std::time::Duration;

/// Backoff schedule for retryable attempt failures.
///
/// The delay before attempt `n + 1` is `base * 2^n` — with the production
/// base of one second: 2s, 4s, 8s, ... unbounded and without jitter. Tests
/// shrink the base so suites don't sleep for real.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy with a custom backoff base.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay to sleep after attempt `attempt` fails retryably.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(30))
    }
}
