//! Bounded retry for calls to external collaborators.
//!
//! Delays grow exponentially from `first_retry_interval_ms` by
//! `backoff_coefficient` and are capped at `max_retry_interval_ms`, so they
//! never decrease between attempts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for activities and sub-workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub first_retry_interval_ms: u64,

    /// Multiplier applied to the delay after each retry (values below 1.0 are treated as 1.0).
    pub backoff_coefficient: f64,

    /// Upper bound for any single delay.
    pub max_retry_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            first_retry_interval_ms: 5000,
            backoff_coefficient: 2.0,
            max_retry_interval_ms: 60_000,
        }
    }
}

/// Failure returned once every attempt has failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed after {} attempts: {}", self.attempts, self.last_error)
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Same attempts and growth, with a different first delay.
    pub fn with_first_retry_interval(mut self, interval: Duration) -> Self {
        self.first_retry_interval_ms = interval.as_millis() as u64;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (1 = first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let coefficient = self.backoff_coefficient.max(1.0);
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.first_retry_interval_ms as f64 * coefficient.powi(exponent);
        let capped = millis.min(self.max_retry_interval_ms.max(self.first_retry_interval_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// `operation` must be safe to repeat.
    pub async fn execute<T, E, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
    ) -> std::result::Result<T, RetryExhausted<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = name, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= attempts => {
                    warn!(operation = name, attempt, %error, "giving up");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
