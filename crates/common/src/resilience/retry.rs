//! Retry with exponential backoff.
//!
//! The executor re-runs a fallible async operation until it succeeds, the
//! policy declares the error terminal, or attempts run out. On exhaustion
//! the *last observed error* is returned unchanged — callers see the real
//! failure, not a wrapper.
//!
//! Delays are `base_delay * 2^attempt` with a zero-based attempt index, so
//! the wait after the first failure is exactly `base_delay`.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Whether a failed attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Decides, per error and attempt, whether another attempt is worthwhile.
pub trait RetryPolicy<E> {
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Blanket impl so closures can be used as policies directly.
impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Retry budget and pacing.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, initial try included. Clamped to at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each further retry.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(1000) }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// Backoff delay for the given zero-based attempt index.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Cap the shift so pathological attempt counts cannot overflow.
        let multiplier = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Executes operations under a [`RetryConfig`] and [`RetryPolicy`].
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Run `operation` until success, a terminal error, or exhaustion.
    ///
    /// # Errors
    /// Returns the last error produced by `operation`.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 0..attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt + 1 >= attempts {
                        warn!(attempts, "retry attempts exhausted");
                        return Err(error);
                    }

                    if self.policy.classify(&error, attempt) == RetryDecision::Stop {
                        debug!(attempt = attempt + 1, "error is not retryable, giving up");
                        return Err(error);
                    }

                    let delay = self.config.delay_for(attempt);
                    warn!(attempt = attempt + 1, ?delay, "attempt failed, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Loop always returns within `attempts` iterations.
        unreachable!("retry loop exited without a result")
    }
}

/// One-off convenience wrapper around [`RetryExecutor`].
///
/// # Errors
/// Returns the last error produced by `operation`.
pub async fn retry<F, Fut, T, E, P>(config: RetryConfig, policy: P, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
{
    RetryExecutor::new(config, policy).execute(operation).await
}
