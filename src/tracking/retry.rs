//! Bounded retry with exponential backoff and jitter

use crate::error::Result;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the computed delay added at random, in [0, 1]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter.min(1.0));
        delay + delay.mul_f64(extra)
    }

    /// Run `op` until it succeeds or the attempts are exhausted; the last
    /// error is returned
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_with_jitter(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            jitter: 0.0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
        assert_eq!(policy.backoff(10), Duration::from_millis(300));
    }

    #[test]
    fn test_run_retries_until_success() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: 0.5,
        };
        let mut calls = 0;
        let value = policy
            .run("flaky", || {
                calls += 1;
                if calls < 3 {
                    Err(PipelineError::Tracking("unavailable".into()))
                } else {
                    Ok(calls)
                }
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_run_gives_up() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::none().run("down", || {
            calls += 1;
            Err(PipelineError::Tracking("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
