//! Race an operation against a timer without cancelling it.
//!
//! Unlike `tokio::time::timeout`, losing the race does not abort the
//! operation: it is spawned as a task and keeps running detached. That
//! matches the console's contract — a caller-imposed deadline rejects the
//! caller's wait, but the underlying network call still runs to completion
//! (and may still, for example, land a write on the server).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Default caller-level race deadline.
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// The timer won the race.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation still running after {limit:?}")]
pub struct Elapsed {
    pub limit: Duration,
}

/// Resolve with the operation's output, or fail with [`Elapsed`] once
/// `limit` passes. The operation is detached on timeout, never aborted.
///
/// # Errors
/// Returns [`Elapsed`] when the deadline fires first.
pub async fn race_timeout<F>(limit: Duration, operation: F) -> Result<F::Output, Elapsed>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(operation);

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_error)) => {
            // The spawned operation panicked; surface it on the caller.
            std::panic::resume_unwind(join_error.into_panic())
        }
        // Dropping the JoinHandle detaches the task.
        Err(_) => Err(Elapsed { limit }),
    }
}
