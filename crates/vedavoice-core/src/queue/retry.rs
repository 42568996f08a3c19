//! Retry policy: backoff delays and queue-wide limits.

use std::time::Duration;

/// Retry policy for failed deliveries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// `max_retries` for requests that do not set their own.
    pub default_max_retries: u32,

    /// Persisted items at least this old are dropped on load.
    pub max_age: Duration,

    /// Wait after an offline -> online transition before draining.
    pub online_settle_delay: Duration,
}

impl Default for RetryPolicy {
    /// 1s base, x2, 3 retries, 24h max age, 1s settle delay.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            default_max_retries: 3,
            max_age: Duration::from_secs(24 * 60 * 60),
            online_settle_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Calculate the wait before the next attempt.
    ///
    /// # Arguments
    /// * `retry_count` - Failed attempts so far, including the one just made (1-indexed).
    ///
    /// delay = base_delay * multiplier^(retry_count - 1)
    ///
    /// With base_delay=1s, multiplier=2.0: 1s, 2s, 4s, 8s, ...
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }

    /// `max_age` as a chrono duration for comparing wall-clock timestamps.
    pub fn max_age_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::MAX)
    }
}
