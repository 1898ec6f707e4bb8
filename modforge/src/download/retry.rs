//! Fixed-delay retry for network transfers.

use std::thread;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::ModResult;

/// Retry policy applied to connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Blocking delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: crate::config::DEFAULT_RETRY_ATTEMPTS,
            delay: crate::config::DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned unchanged.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut(u32) -> ModResult<T>) -> ModResult<T> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    tracing::warn!(
                        resource = %what,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Connection failed, retrying in {}s",
                        self.delay.as_secs()
                    );
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModError;

    fn network() -> ModError {
        ModError::Network {
            url: "http://x".to_string(),
            reason: "refused".to_string(),
        }
    }

    #[test]
    fn test_succeeds_after_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result = policy.run("x", |_| {
            calls += 1;
            if calls < 3 {
                Err(network())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_surfaces_after_exhaustion() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result: ModResult<()> = policy.run("x", |_| {
            calls += 1;
            Err(network())
        });
        assert!(matches!(result, Err(ModError::Network { .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let result: ModResult<()> = policy.run("x", |_| {
            calls += 1;
            Err(ModError::HttpStatus {
                url: "http://x".to_string(),
                status: 500,
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
