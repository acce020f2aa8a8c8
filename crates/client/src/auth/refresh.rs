//! Single-flight coordination for token refresh.
//!
//! Any number of requests can hit a 401 at the same time, but only one
//! refresh call may be in flight. The first caller to enter becomes the
//! owner and performs the refresh; everyone else parks on a oneshot channel
//! and receives the owner's outcome. Waiters are completed in arrival order,
//! and every waiter gets exactly one terminal outcome.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::errors::ApiError;

/// Outcome delivered to the owner and every waiter: the new access token.
pub type RefreshOutcome = Result<String, ApiError>;

/// Role handed out by [`RefreshCoordinator::begin`].
pub(crate) enum RefreshTicket {
    /// This caller performs the refresh and must call
    /// [`RefreshCoordinator::complete`] exactly once.
    Owner,
    /// Another refresh is in flight; await the owner's outcome here.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Default)]
struct State {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Serializes refreshes so at most one is ever in flight.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the current refresh, or become its owner if none is running.
    pub(crate) fn begin(&self) -> RefreshTicket {
        let mut state = self.state.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            RefreshTicket::Waiter(rx)
        } else {
            state.refreshing = true;
            RefreshTicket::Owner
        }
    }

    /// Publish the owner's outcome to every queued waiter, oldest first,
    /// and reopen the coordinator for future refreshes.
    pub(crate) fn complete(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        for waiter in waiters {
            // A waiter that gave up waiting just drops its receiver.
            let _ = waiter.send(outcome.clone());
        }
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }
}
