//! Backoff policies for reconnecting and retrying.
//!
//! Pure delay arithmetic; the jitter source is injected so the policy can
//! be tested deterministically.

use std::time::Duration;

use rand::Rng;

/// Exponential reconnect backoff with a ceiling, jitter and an optional
/// attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound for the exponential part.
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter added to every delay.
    pub max_jitter: Duration,
    /// Attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), without jitter.
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay including jitter drawn from `rng`.
    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=jitter_ms))
        };
        self.base_delay_for(attempt) + jitter
    }

    /// Whether `attempt` reconnects have been used up.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_jitter: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Linear retry schedule for a single lookup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first.
    pub max_attempts: u32,
    /// Delay increment: attempt `n` waits `n * step` before running.
    pub step: Duration,
}

impl RetryPolicy {
    /// Wait before attempt `attempt` (0-based); nothing before the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_reconnect_delay_doubles_then_caps() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::ZERO,
            max_attempts: None,
        };

        assert_eq!(policy.base_delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.base_delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.base_delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy = ReconnectPolicy {
            max_jitter: Duration::from_millis(250),
            ..ReconnectPolicy::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let delay = policy.delay_for(1, &mut rng);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_attempt_limit() {
        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            ..ReconnectPolicy::default()
        };
        assert!(!policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
        assert!(!ReconnectPolicy::default().is_exhausted(u32::MAX));
    }

    #[test]
    fn test_retry_delays_are_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
    }
}
