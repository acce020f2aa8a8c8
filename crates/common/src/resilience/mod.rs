//! Resilience primitives: retry with exponential backoff and a
//! race-against-a-timer helper for slow operations.

pub mod retry;
pub mod timeout;

pub use retry::{retry, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy};
pub use timeout::{race_timeout, Elapsed, DEFAULT_RACE_TIMEOUT};
