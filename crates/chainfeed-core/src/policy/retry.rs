//! Fixed-delay, bounded-attempt retry policy.

use std::time::Duration;

/// Stateless retry policy. Decides the delay before the next attempt given
/// the number of consecutive failures so far.
///
/// There is no backoff growth: every retry waits `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay before reopening after `failures` consecutive
    /// failed attempts (1-based), or `None` once `failures` has reached
    /// `max_attempts`.
    pub fn next_delay(&self, failures: u32) -> Option<Duration> {
        self.should_retry(failures).then_some(self.interval)
    }

    /// Returns `true` if another attempt is allowed after `failures`.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(5_000), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_fixed() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 5);
        let d1 = policy.next_delay(1).unwrap();
        let d2 = policy.next_delay(2).unwrap();
        let d4 = policy.next_delay(4).unwrap();
        assert_eq!(d1.as_millis(), 100);
        assert_eq!(d2, d1);
        assert_eq!(d4, d1);
    }

    #[test]
    fn should_retry_boundary() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(policy.next_delay(3).is_none());
        assert!(policy.next_delay(10).is_none());
    }

    #[test]
    fn defaults_match_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval(), Duration::from_secs(5));
        assert_eq!(policy.max_attempts(), 5);
    }
}
