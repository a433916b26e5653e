//! Retry interval for failed sync cycles.

use std::time::Duration;

/// What to do after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    /// Wait this long before the next attempt.
    pub delay: Duration,
    /// The failure is no longer a single transient miss.
    pub escalate: bool,
}

/// Doubling retry interval between a floor and a cap.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    floor: Duration,
    cap: Duration,
    current: Duration,
}

impl RetryBackoff {
    pub fn new(floor: Duration, cap: Duration) -> Self {
        Self {
            floor,
            cap,
            current: floor,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Wait the current interval, then double it up to the cap. Failures
    /// escalate once the interval has grown past its floor.
    pub fn on_failure(&mut self) -> Retry {
        let retry = Retry {
            delay: self.current,
            escalate: self.current > self.floor,
        };
        self.current = (self.current * 2).min(self.cap);
        retry
    }

    pub fn on_success(&mut self) {
        self.current = self.floor;
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_up_to_cap() {
        let mut backoff = RetryBackoff::default();
        let delays: Vec<u64> = (0..6).map(|_| backoff.on_failure().delay.as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_first_failure_does_not_escalate() {
        let mut backoff = RetryBackoff::default();
        assert!(!backoff.on_failure().escalate);
        assert!(backoff.on_failure().escalate);
        assert!(backoff.on_failure().escalate);
    }

    #[test]
    fn test_success_resets_to_floor() {
        let mut backoff = RetryBackoff::default();
        backoff.on_failure();
        backoff.on_failure();
        assert_eq!(backoff.current(), Duration::from_secs(20));

        backoff.on_success();
        assert_eq!(backoff.current(), Duration::from_secs(5));
        assert!(!backoff.on_failure().escalate);
    }
}
