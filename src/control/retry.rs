//! Retry policy for transient submission failures.

use std::time::Duration;

/// Bounded exponential backoff.
///
/// A sample that fails transiently is retried up to `max_retries` times;
/// the delay before retry `n` (zero-based) is `base_delay * multiplier^n`.
/// Permanent failures never consult this policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor between consecutive retries.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,                        // initial attempt + 2 retries
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next retry, given how many retries the sample has
    /// already used. `None` when the budget is exhausted.
    pub fn next_delay(&self, retries_used: u32) -> Option<Duration> {
        if retries_used >= self.max_retries {
            return None;
        }
        Some(self.base_delay.mul_f64(self.multiplier.powi(retries_used as i32)))
    }

    /// Total attempts a sample may consume, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
