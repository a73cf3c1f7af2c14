//! Automatic retry policy for transient camera faults.

use std::time::Duration;

use tokio::time::Instant;

/// Default consecutive failures tolerated before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor between retries.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default cap on a single retry delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Default window in which failures count as consecutive.
const DEFAULT_COOLDOWN_WINDOW: Duration = Duration::from_secs(30);

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive failures after which automatic retry stops.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Failures further apart than this start a fresh count.
    pub cooldown_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            cooldown_window: DEFAULT_COOLDOWN_WINDOW,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based):
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }
}

/// Counts consecutive transient failures inside the cooldown window.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    policy: RetryPolicy,
    count: u32,
    last_failure: Option<Instant>,
}

impl FailureTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            count: 0,
            last_failure: None,
        }
    }

    /// Record a failure at `now` and return the updated count.
    pub fn record_failure(&mut self, now: Instant) -> u32 {
        let stale = self
            .last_failure
            .is_some_and(|last| now.saturating_duration_since(last) > self.policy.cooldown_window);
        if stale {
            self.count = 0;
        }
        self.count = self.count.saturating_add(1);
        self.last_failure = Some(now);
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_failure = None;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn exhausted(&self) -> bool {
        self.count >= self.policy.max_attempts
    }

    /// Delay before the next automatic retry.
    pub fn next_delay(&self) -> Duration {
        self.policy.delay_for(self.count)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_tracker_exhausts_at_max_attempts() {
        let mut tracker = FailureTracker::new(RetryPolicy::default());
        let now = Instant::now();
        assert_eq!(tracker.record_failure(now), 1);
        assert_eq!(tracker.record_failure(now + Duration::from_secs(1)), 2);
        assert!(!tracker.exhausted());
        assert_eq!(tracker.record_failure(now + Duration::from_secs(2)), 3);
        assert!(tracker.exhausted());

        tracker.reset();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.exhausted());
    }

    #[test]
    fn test_failures_outside_window_start_over() {
        let mut tracker = FailureTracker::new(RetryPolicy::default());
        let now = Instant::now();
        tracker.record_failure(now);
        tracker.record_failure(now + Duration::from_secs(5));
        assert_eq!(tracker.record_failure(now + Duration::from_secs(60)), 1);
    }
}
