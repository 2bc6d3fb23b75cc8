/// Fixed-interval polling policy shared by the blocking waits
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between two polls
    pub interval: Duration,
    /// Extra delay after an explicit failure was observed
    pub failure_backoff: Duration,
    /// `None` polls forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            failure_backoff: Duration::ZERO,
            max_attempts: None,
        }
    }

    pub const fn with_failure_backoff(self, backoff: Duration) -> Self {
        Self {
            failure_backoff: backoff,
            ..self
        }
    }

    #[cfg(test)]
    pub const fn with_max_attempts(self, attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            ..self
        }
    }

    /// Wireless link status polling: 1 s, 10 s after a rejected association
    pub const fn link() -> Self {
        Self::unbounded(Duration::from_secs(1)).with_failure_backoff(Duration::from_secs(10))
    }

    /// Clock polling while waiting for network time
    pub const fn clock() -> Self {
        Self::unbounded(Duration::from_millis(500))
    }

    /// Waiting for the sensor to answer at boot
    pub const fn sensor_startup() -> Self {
        Self::unbounded(Duration::from_secs(5))
    }

    /// Whether another poll is allowed after `attempts` polls
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_policy_never_runs_out() {
        let policy = RetryPolicy::link();
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX));
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.failure_backoff, Duration::from_secs(10));
    }

    #[test]
    fn capped_policy_stops_at_the_cap() {
        let policy = RetryPolicy::clock().with_max_attempts(3);
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }
}
