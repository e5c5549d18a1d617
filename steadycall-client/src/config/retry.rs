//! Retry policy with exponential backoff and jitter.
//!
//! # Overview
//!
//! - [`RetryPolicy`]: Retry limit and delay schedule for one logical call
//! - [`Jitter`]: Source of the random component added to each delay
//!
//! The delay before retry number `attempt + 1` is
//!
//! ```text
//! min(base * 2^attempt + jitter, ceiling)    jitter in [0, base]
//! ```
//!
//! The first attempt is never delayed; delays only separate retries.
//!
//! # Retryable Errors
//!
//! Only the transient kinds are retried:
//! - [`ErrorKind::RateLimited`]
//! - [`ErrorKind::ServerError`]
//! - [`ErrorKind::ConnectionError`]
//! - [`ErrorKind::TimeoutError`]
//!
//! Every other kind is surfaced immediately.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use steadycall_core::ErrorKind;

use super::options::CallOptions;

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Default per-attempt timeout.
    pub const TIMEOUT: Duration = Duration::from_secs(600);

    /// Default maximum number of retries (not counting the first attempt).
    pub const MAX_RETRIES: u32 = 2;

    /// Default base delay of the backoff schedule.
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

    /// Default upper bound for a single backoff delay.
    pub const RETRY_CEILING: Duration = Duration::from_secs(8);

    /// Default response header carrying the correlation identifier.
    pub const REQUEST_ID_HEADER: &str = "x-request-id";

    /// Default query parameter used to send a continuation token.
    pub const PAGE_TOKEN_PARAM: &str = "page_token";

    /// Default limit on pages fetched by one traversal.
    pub const MAX_PAGES: usize = 10_000;
}

/// Source of the random component of a backoff delay.
///
/// Implementations return a duration in `[0, upper]`.
pub trait Jitter: Send + Sync + Debug {
    /// Draw a jitter value no larger than `upper`.
    fn draw(&self, upper: Duration) -> Duration;
}

/// Uniformly random jitter backed by `rand`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn draw(&self, upper: Duration) -> Duration {
        upper.mul_f64(rand::random::<f64>())
    }
}

/// No jitter: delays are exactly `base * 2^attempt`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn draw(&self, _upper: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Jitter that is always the same fraction of its upper bound.
///
/// The fraction is clamped to `[0.0, 1.0]`.
#[derive(Clone, Copy, Debug)]
pub struct FixedJitter {
    fraction: f64,
}

impl FixedJitter {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

impl Jitter for FixedJitter {
    fn draw(&self, upper: Duration) -> Duration {
        upper.mul_f64(self.fraction)
    }
}

/// Configuration for retry behavior.
///
/// # Default Values
///
/// - `max_retries`: 2
/// - `base_delay`: 500ms
/// - `max_delay`: 8 seconds
/// - `jitter`: [`RandomJitter`]
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use steadycall_client::{NoJitter, RetryPolicy};
/// use steadycall_client::ErrorKind;
///
/// let policy = RetryPolicy::new()
///     .max_retries(3)
///     .base_delay(Duration::from_millis(100))
///     .jitter(NoJitter);
///
/// assert_eq!(
///     policy.next_delay(2, ErrorKind::RateLimited),
///     Some(Duration::from_millis(400))
/// );
/// assert_eq!(policy.next_delay(3, ErrorKind::RateLimited), None);
/// assert_eq!(policy.next_delay(0, ErrorKind::NotFound), None);
/// ```
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the first attempt).
    pub max_retries: u32,

    /// Base delay of the exponential schedule and the upper bound of jitter.
    pub base_delay: Duration,

    /// Maximum delay between attempts. The delay never exceeds this value.
    pub max_delay: Duration,

    jitter: Arc<dyn Jitter>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::RETRY_BASE_DELAY,
            max_delay: defaults::RETRY_CEILING,
            jitter: Arc::new(RandomJitter),
        }
    }
}

impl RetryPolicy {
    /// Create a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a retry policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the jitter source.
    pub fn jitter<J: Jitter + 'static>(mut self, jitter: J) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    pub(crate) fn shared_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.base_delay > self.max_delay {
            return Err("base_delay must not exceed max_delay");
        }
        Ok(())
    }

    /// Compute the delay before the retry that follows failed attempt
    /// number `attempt` (0-based).
    ///
    /// Returns `None` if `kind` is not retryable or the retry budget is
    /// spent (`attempt >= max_retries`).
    pub fn next_delay(&self, attempt: u32, kind: ErrorKind) -> Option<Duration> {
        if !kind.is_retryable() || attempt >= self.max_retries {
            return None;
        }

        let exponential = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        let jitter = self.jitter.draw(self.base_delay).min(self.base_delay);

        Some(exponential.saturating_add(jitter).min(self.max_delay))
    }

    /// Apply per-call overrides, leaving `self` untouched.
    pub(crate) fn with_overrides(&self, options: &CallOptions) -> Self {
        Self {
            max_retries: options.max_retries.unwrap_or(self.max_retries),
            base_delay: options.retry_base_delay.unwrap_or(self.base_delay),
            max_delay: options.retry_ceiling.unwrap_or(self.max_delay),
            jitter: Arc::clone(&self.jitter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRYABLE: [ErrorKind; 4] = [
        ErrorKind::RateLimited,
        ErrorKind::ServerError,
        ErrorKind::ConnectionError,
        ErrorKind::TimeoutError,
    ];

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.next_delay(0, ErrorKind::ServerError), None);
    }

    #[test]
    fn test_retry_policy_validate() {
        let invalid = RetryPolicy::new()
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(1));
        assert_eq!(
            invalid.validate(),
            Err("base_delay must not exceed max_delay")
        );
    }

    #[test]
    fn test_none_once_budget_is_spent() {
        let policy = RetryPolicy::new().max_retries(3);
        for attempt in [3, 4, 10, u32::MAX] {
            for kind in ErrorKind::ALL {
                assert_eq!(policy.next_delay(attempt, kind), None, "{attempt} {kind}");
            }
        }
    }

    #[test]
    fn test_none_for_non_retryable_kinds() {
        let policy = RetryPolicy::new().max_retries(5);
        for kind in ErrorKind::ALL.into_iter().filter(|k| !k.is_retryable()) {
            assert_eq!(policy.next_delay(0, kind), None, "{kind}");
        }
    }

    #[test]
    fn test_delay_bounds_with_random_jitter() {
        let base = Duration::from_millis(500);
        let policy = RetryPolicy::new()
            .max_retries(6)
            .base_delay(base)
            .max_delay(Duration::from_secs(8));

        for _ in 0..50 {
            for attempt in 0..6 {
                for kind in RETRYABLE {
                    let delay = policy.next_delay(attempt, kind).unwrap();
                    let low = (base * 2u32.pow(attempt)).min(policy.max_delay);
                    let high = (base * 2u32.pow(attempt) + base).min(policy.max_delay);
                    assert!(delay >= low && delay <= high, "attempt {attempt}: {delay:?}");
                }
            }
        }
    }

    #[test]
    fn test_no_jitter_schedule() {
        let policy = RetryPolicy::new().max_retries(6).jitter(NoJitter);
        let delays: Vec<_> = (0..6)
            .map(|a| policy.next_delay(a, ErrorKind::ServerError).unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                // 16s clamped to the ceiling
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_fixed_jitter_adds_fraction_of_base() {
        let policy = RetryPolicy::new()
            .base_delay(Duration::from_millis(200))
            .jitter(FixedJitter::new(0.5));
        assert_eq!(
            policy.next_delay(1, ErrorKind::RateLimited),
            Some(Duration::from_millis(500))
        );
        assert_eq!(FixedJitter::new(7.0).draw(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn test_large_attempts_saturate() {
        let policy = RetryPolicy::new().max_retries(u32::MAX).jitter(NoJitter);
        assert_eq!(
            policy.next_delay(200, ErrorKind::ConnectionError),
            Some(Duration::from_secs(8))
        );
    }

    #[test]
    fn test_overrides_do_not_touch_original() {
        let policy = RetryPolicy::default();
        let options = CallOptions::new()
            .max_retries(5)
            .retry_base_delay(Duration::from_millis(10));
        let merged = policy.with_overrides(&options);
        assert_eq!(merged.max_retries, 5);
        assert_eq!(merged.base_delay, Duration::from_millis(10));
        assert_eq!(merged.max_delay, Duration::from_secs(8));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
