//! Backoff policy for eventual-consistency polling.

use std::time::Duration;

/// Policy for polling an eventually-consistent read until it converges.
///
/// The reconciliation engine polls with a multiplicative backoff: intervals
/// start at `initial_interval`, grow by `multiplier` per attempt, and are
/// capped at `max_interval`; the whole loop is bounded by the `max_wait`
/// wall-clock budget.
///
/// ## Default Values
///
/// - `max_wait`: 3s
/// - `initial_interval`: 100ms
/// - `multiplier`: 1.5
/// - `max_interval`: 1s
///
/// ## Example
///
/// ```rust
/// use policysync::config::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::new()
///     .with_max_wait(Duration::from_secs(5))
///     .with_initial_interval(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total wall-clock budget for the polling loop.
    pub max_wait: Duration,

    /// Interval before the second attempt.
    pub initial_interval: Duration,

    /// Multiplier applied to the interval after every attempt.
    pub multiplier: f64,

    /// Upper bound on the interval between attempts.
    pub max_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(3000),
            initial_interval: Duration::from_millis(100),
            multiplier: 1.5,
            max_interval: Duration::from_millis(1000),
        }
    }
}

impl BackoffPolicy {
    /// Creates a backoff policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total wall-clock budget.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the interval before the second attempt.
    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the interval multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the upper bound on the interval between attempts.
    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Returns the interval that follows `current`, grown and capped.
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        let grown = current.mul_f64(self.multiplier);
        std::cmp::min(grown, self.max_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_wait, Duration::from_millis(3000));
        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert_eq!(policy.max_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_next_interval_grows_and_caps() {
        let policy = BackoffPolicy::default();
        let mut interval = policy.initial_interval;
        interval = policy.next_interval(interval);
        assert_eq!(interval, Duration::from_millis(150));
        for _ in 0..10 {
            interval = policy.next_interval(interval);
        }
        assert_eq!(interval, Duration::from_millis(1000));
    }
}
