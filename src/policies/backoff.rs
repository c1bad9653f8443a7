//! # Logarithmic backoff policy for failing polls.
//!
//! [`BackoffPolicy`] controls how the idle delay grows after consecutive
//! poll failures. It is parameterized by:
//! - [`BackoffPolicy::base`] the interval used after a successful poll;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for retry attempt `n` (1-based) is `round(base × ln(n + 1))`,
//! clamped to `max`. Growth is sub-linear: the first retry waits about
//! `0.693 × base`, the fourth about `1.609 × base`. The value is derived from
//! `n` alone on every call, so nothing accumulates between iterations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pollvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::new(Duration::from_millis(2000), Duration::from_millis(10_000));
//!
//! assert_eq!(backoff.next(1), Duration::from_millis(1386));
//! assert_eq!(backoff.next(2), Duration::from_millis(2197));
//! assert_eq!(backoff.next(1000), Duration::from_millis(10_000));
//! ```

use std::time::Duration;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Interval after a successful poll; scale of the logarithmic curve.
    pub base: Duration,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Returns `base = 30s`, `max = 300s`.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with the given base interval and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Computes the delay for the given retry attempt (1-based).
    ///
    /// Attempt `0` is treated as `1`. Non-finite intermediate values and
    /// anything above [`BackoffPolicy::max`] clamp to `max`.
    pub fn next(&self, retry_attempt: u32) -> Duration {
        let n = f64::from(retry_attempt.max(1));
        let base_ms = self.base.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        let raw_ms = (base_ms * (n + 1.0).ln()).round();
        if !raw_ms.is_finite() || raw_ms >= max_ms {
            return self.max;
        }
        Duration::from_millis(raw_ms.max(0.0) as u64)
    }
}
