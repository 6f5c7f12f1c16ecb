//! Bounded retry policy applied to pool acquisitions.

use std::time::Duration;

/// Limits how often and how patiently a unit acquisition is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Three attempts, one second apart.
    pub const DEFAULT: Self = Self::new(3, Duration::from_secs(1));

    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        let max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts,
            delay,
        }
    }

    /// Total number of attempts made for a single unit, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Suspension that follows every failed attempt.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Reports whether another attempt follows `failed` failed attempts.
    #[must_use]
    pub const fn allows_retry(&self, failed: u32) -> bool {
        failed < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_makes_three_attempts_one_second_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), Duration::from_secs(1));
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.allows_retry(1));
    }
}
