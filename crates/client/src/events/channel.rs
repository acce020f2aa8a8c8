//! Reconnecting push channel.
//!
//! The channel keeps one WebSocket to the backend's `/ws` endpoint and
//! buffers parsed frames for consumers. Connection loss is expected and
//! self-healing: after any close or connect failure the channel waits a
//! fixed delay and dials again with the current access token, until
//! [`EventChannel::disconnect`] is called or the session ends.
//!
//! Consumers read two things: the bounded frame buffer (oldest evicted
//! first) and a latest-metrics slot that always holds the most recent
//! metrics payload regardless of buffer churn.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fluxgate_domain::{MessageKind, PushMessage};

use crate::auth::SessionStore;

/// Settings for [`EventChannel`].
#[derive(Debug, Clone)]
pub struct EventChannelConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub url: String,
    /// Fixed wait between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Maximum buffered frames; older frames are evicted first.
    pub buffer_limit: usize,
}

impl Default for EventChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            reconnect_delay: Duration::from_secs(5),
            buffer_limit: 100,
        }
    }
}

/// State shared between the channel handle and its reader task.
struct ChannelState {
    connected: AtomicBool,
    buffer: Mutex<VecDeque<PushMessage>>,
    latest_metrics: Mutex<Option<Value>>,
    buffer_limit: usize,
}

impl ChannelState {
    fn new(buffer_limit: usize) -> Self {
        Self {
            connected: AtomicBool::new(false),
            buffer: Mutex::new(VecDeque::new()),
            latest_metrics: Mutex::new(None),
            buffer_limit,
        }
    }

    /// Parse one text frame. Malformed frames are logged and dropped; they
    /// never take the connection down.
    fn handle_frame(&self, raw: &str) {
        match serde_json::from_str::<PushMessage>(raw) {
            Ok(message) => self.push(message),
            Err(err) => warn!(error = %err, "dropping malformed push frame"),
        }
    }

    fn push(&self, message: PushMessage) {
        if message.kind == MessageKind::Metrics {
            *self.latest_metrics.lock() = Some(message.data.clone());
        }

        let mut buffer = self.buffer.lock();
        buffer.push_back(message);
        while buffer.len() > self.buffer_limit {
            buffer.pop_front();
        }
    }
}

/// Handle to the reconnecting push channel.
pub struct EventChannel {
    config: EventChannelConfig,
    session: Arc<SessionStore>,
    state: Arc<ChannelState>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl EventChannel {
    #[must_use]
    pub fn new(config: EventChannelConfig, session: Arc<SessionStore>) -> Self {
        let state = Arc::new(ChannelState::new(config.buffer_limit));
        Self { config, session, state, task: Mutex::new(None) }
    }

    /// Start the channel. A no-op when it is already running, and when no
    /// access token is held (the channel cannot authenticate without one).
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if let Some((_, handle)) = task.as_ref() {
            if !handle.is_finished() {
                debug!("push channel already running");
                return;
            }
        }

        if !self.session.is_authenticated() {
            warn!("not signed in, push channel not started");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&self.state),
            Arc::clone(&self.session),
            self.config.clone(),
            cancel.clone(),
        ));
        *task = Some((cancel, handle));
    }

    /// Stop the channel and its reconnect loop. Safe to call repeatedly and
    /// when never connected.
    pub fn disconnect(&self) {
        if let Some((cancel, handle)) = self.task.lock().take() {
            cancel.cancel();
            handle.abort();
            info!("push channel stopped");
        }
        self.state.connected.store(false, Ordering::SeqCst);
    }

    /// Whether a socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Snapshot of the buffered frames, oldest first.
    #[must_use]
    pub fn recent_messages(&self) -> Vec<PushMessage> {
        self.state.buffer.lock().iter().cloned().collect()
    }

    /// The most recent metrics payload, if any arrived.
    #[must_use]
    pub fn latest_metrics(&self) -> Option<Value> {
        self.state.latest_metrics.lock().clone()
    }

    /// Drop all buffered frames. The latest-metrics slot is kept.
    pub fn clear_messages(&self) {
        self.state.buffer.lock().clear();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Dial, read until the socket drops, wait, repeat.
async fn run(
    state: Arc<ChannelState>,
    session: Arc<SessionStore>,
    config: EventChannelConfig,
    cancel: CancellationToken,
) {
    loop {
        let Some(token) = session.access_token() else {
            debug!("session gone, push channel stopping");
            return;
        };
        let url = format!("{}?token={token}", config.url);

        tokio::select! {
            () = cancel.cancelled() => return,
            attempt = connect_async(&url) => match attempt {
                Ok((stream, _)) => {
                    info!("push channel connected");
                    state.connected.store(true, Ordering::SeqCst);

                    let (_sink, mut source) = stream.split();
                    loop {
                        tokio::select! {
                            () = cancel.cancelled() => {
                                state.connected.store(false, Ordering::SeqCst);
                                return;
                            }
                            frame = source.next() => match frame {
                                Some(Ok(Message::Text(text))) => state.handle_frame(&text),
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    warn!(error = %err, "push channel read failed");
                                    break;
                                }
                            }
                        }
                    }

                    state.connected.store(false, Ordering::SeqCst);
                    warn!("push channel closed, will reconnect");
                }
                Err(err) => warn!(error = %err, "push channel connect failed"),
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}
