//! User-facing failure signals.
//!
//! The API layer does not own any UI; it reports operator-relevant events
//! through a [`Notifier`] injected at construction. Each terminal request
//! failure surfaces exactly one signal, and a failed token refresh
//! additionally fires [`Notifier::session_ended`] exactly once no matter how
//! many requests were queued behind the refresh.

use std::sync::Arc;

use tracing::{error, warn};

/// Category of a surfaced failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// No HTTP response at all.
    NetworkUnreachable,
    /// 401 past the refresh-and-replay cycle, or a failed refresh.
    Unauthorized,
    /// 403.
    Forbidden,
    /// 404.
    NotFound,
    /// 429.
    RateLimited,
    /// 5xx.
    ServerError,
    /// Any other non-success response.
    RequestFailed,
}

/// Sink for operator-facing events.
pub trait Notifier: Send + Sync {
    /// A request failed terminally.
    fn surface(&self, signal: Signal, message: &str);

    /// The session is no longer usable; the operator must sign in again.
    fn session_ended(&self);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn surface(&self, signal: Signal, message: &str) {
        (**self).surface(signal, message);
    }

    fn session_ended(&self) {
        (**self).session_ended();
    }
}

/// Default sink: structured log lines, no UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn surface(&self, signal: Signal, message: &str) {
        match signal {
            Signal::NetworkUnreachable | Signal::ServerError => {
                error!(?signal, message, "request failed");
            }
            _ => warn!(?signal, message, "request failed"),
        }
    }

    fn session_ended(&self) {
        warn!("session ended, sign-in required");
    }
}
