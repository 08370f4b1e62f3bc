//! Exponential backoff with jitter for Wiz API calls.

use rand::Rng;
use std::time::Duration;

/// Retry policy configuration.
///
/// `max_attempts` counts every request sent, the first one included.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per logical call (default: 5).
    pub max_attempts: u32,
    /// Base delay for exponential backoff (default: 1s).
    pub base_delay: Duration,
    /// Maximum delay cap (default: 32s).
    pub max_delay: Duration,
    /// Jitter as a fraction of the computed delay (default: 0.1).
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy optimized for testing (millisecond delays).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            jitter_fraction: 0.1,
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }
        if self.base_delay.is_zero() {
            return Err("base_delay must be > 0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("max_delay must be >= base_delay".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("jitter_fraction must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }

    /// Whether another attempt may follow the 0-indexed `attempt` that just failed.
    #[must_use]
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Un-jittered delay after the 0-indexed `attempt`: `min(base * 2^attempt, cap)`.
    #[must_use]
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (base * 2_f64.powi(exponent)).min(max);
        Duration::from_secs_f64(delay)
    }

    /// Jittered delay after the 0-indexed `attempt`, never above the cap.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        self.jittered(attempt, sample)
    }

    /// Applies a jitter sample in `[-1, 1]` to the ceiling of `attempt`.
    fn jittered(&self, attempt: u32, sample: f64) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_secs_f64();
        let factor = 1.0 + self.jitter_fraction * sample.clamp(-1.0, 1.0);
        let delay = (ceiling * factor).clamp(0.0, self.max_delay.as_secs_f64());
        Duration::from_secs_f64(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
        assert!((policy.jitter_fraction - 0.1).abs() < f64::EPSILON);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_ceiling_exponential_then_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_ceiling(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_ceiling(4), Duration::from_secs(16));
        assert_eq!(policy.backoff_ceiling(5), Duration::from_secs(32));
        assert_eq!(policy.backoff_ceiling(9), Duration::from_secs(32));
    }

    #[test]
    fn test_jitter_bounds_for_first_six_attempts() {
        let policy = RetryPolicy::default();
        for attempt in 0..=5u32 {
            let ceiling = policy.backoff_ceiling(attempt).as_secs_f64();
            let low = ceiling * 0.9;
            let high = (ceiling * 1.1).min(32.0);
            for _ in 0..500 {
                let delay = policy.delay_for(attempt).as_secs_f64();
                assert!(
                    delay >= low - 1e-9 && delay <= high + 1e-9,
                    "attempt {attempt}: {delay} outside [{low}, {high}]"
                );
            }
        }
    }

    fn assert_secs(actual: Duration, expected: f64) {
        assert!(
            (actual.as_secs_f64() - expected).abs() < 1e-6,
            "{actual:?} != {expected}s"
        );
    }

    #[test]
    fn test_jitter_extremes() {
        let policy = RetryPolicy::default();
        assert_secs(policy.jittered(0, -1.0), 0.9);
        assert_secs(policy.jittered(0, 1.0), 1.1);
        assert_secs(policy.jittered(5, -1.0), 28.8);
        // upper jitter on a capped delay stays at the cap
        assert_secs(policy.jittered(5, 1.0), 32.0);
    }

    #[test]
    fn test_can_retry_counts_total_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.can_retry(0));
        assert!(policy.can_retry(3));
        assert!(!policy.can_retry(4));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut policy = RetryPolicy::default();
        policy.max_attempts = 0;
        assert!(policy.validate().is_err());

        let mut policy = RetryPolicy::default();
        policy.jitter_fraction = 1.5;
        assert!(policy.validate().is_err());

        let mut policy = RetryPolicy::default();
        policy.max_delay = Duration::from_millis(10);
        assert!(policy.validate().is_err());
    }
}
