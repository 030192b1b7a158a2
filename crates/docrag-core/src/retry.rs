//! Bounded retries with per-attempt timeouts for backend calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps between attempts.
    pub fn immediate(max_attempts: u32, timeout: Duration) -> Self {
        Self { max_attempts, initial_backoff: Duration::ZERO, max_backoff: Duration::ZERO, timeout }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
    ///
    /// Each attempt is bounded by `timeout`. Only transient backend errors and
    /// parse failures are retried; a parse failure that survives every attempt is
    /// returned with its final attempt count.
    pub async fn run<T, F, Fut>(&self, backend: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(Error::transient(
                    backend,
                    format!("request timed out after {:?}", self.timeout),
                )),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(backend, attempt, max_attempts, ?delay, error = %err, "retrying backend call");
                    tokio::time::sleep(delay).await;
                }
                Err(Error::Parse { backend, message, .. }) => {
                    return Err(Error::Parse { backend, attempts: attempt, message });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
