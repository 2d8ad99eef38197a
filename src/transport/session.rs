//! Transport session.
//!
//! Owns at most one physical stream to a single relay endpoint, the task
//! that reads from it, and the reconnect loop that replaces it when the relay
//! drops it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex as AsyncMutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::connection::SessionState;
use super::timing::ReconnectPolicy;
use crate::core::{Connector, DEFAULT_CONNECT_TIMEOUT, TransportError, WireSink, WireStream};

/// Upper bound on a graceful close of the write half.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Receives every message read from the stream.
///
/// Called from the read loop; the next message is not read until
/// `on_message` returns, so a slow handler throttles the session.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one inbound message.
    fn on_message(&self, message: String);

    /// The stream went away (peer close, error, or `disconnect`).
    fn on_stream_lost(&self) {}
}

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed for opening a stream.
    pub connect_timeout: Duration,
    /// Behavior after the relay closes the stream.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// State shared between the session handle and its read loop.
struct Shared {
    /// Write half of the current stream. The async mutex serializes sends.
    writer: AsyncMutex<Option<WireSink>>,
    /// Lifecycle flag.
    state: watch::Sender<SessionState>,
    /// Endpoint of the current (or last) stream.
    endpoint: Mutex<Option<String>>,
}

impl Shared {
    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        if previous.can_transition_to(next) {
            debug!(from = %previous, to = %next, "session state changed");
        } else {
            warn!(from = %previous, to = %next, "unexpected session state transition");
        }
    }

    async fn install(&self, sink: WireSink) {
        *self.writer.lock().await = Some(sink);
        self.set_state(SessionState::Connected);
    }

    async fn close_writer(&self, graceful: bool) {
        let sink = self.writer.lock().await.take();
        let Some(mut sink) = sink else {
            return;
        };
        if !graceful {
            return;
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "closing stream failed"),
            Err(_) => debug!("closing stream timed out"),
        }
    }
}

/// Handle of a running read loop.
struct ReadLoopHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A reconnecting session over one physical message stream.
pub struct TransportSession {
    connector: Arc<dyn Connector>,
    handler: Arc<dyn MessageHandler>,
    config: SessionConfig,
    shared: Arc<Shared>,
    /// Serializes `connect` and `disconnect`.
    lifecycle: AsyncMutex<Option<ReadLoopHandle>>,
}

impl TransportSession {
    /// Create a disconnected session.
    pub fn new(
        connector: Arc<dyn Connector>,
        handler: Arc<dyn MessageHandler>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            handler,
            config,
            shared: Arc::new(Shared {
                writer: AsyncMutex::new(None),
                state,
                endpoint: Mutex::new(None),
            }),
            lifecycle: AsyncMutex::new(None),
        }
    }

    /// Open a stream to `endpoint` and start reading from it.
    ///
    /// Returns once the stream is usable. A no-op when already connected to
    /// `endpoint`. A loop that is reconnecting, has given up, or is bound to
    /// another endpoint is stopped first and a fresh stream is opened within
    /// `connect_timeout`.
    pub async fn connect(&self, endpoint: &str) -> Result<(), TransportError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(handle) = lifecycle.take() {
            let current = self.endpoint().as_deref() == Some(endpoint);
            if current && self.is_connected() && !handle.task.is_finished() {
                *lifecycle = Some(handle);
                return Ok(());
            }
            debug!(endpoint, state = %self.state(), "replacing read loop");
            self.stop(handle).await;
        }

        self.shared.set_state(SessionState::Connecting);
        let (sink, stream) =
            match open_stream(self.connector.as_ref(), endpoint, self.config.connect_timeout).await
            {
                Ok(pair) => pair,
                Err(e) => {
                    self.shared.set_state(SessionState::Disconnected);
                    return Err(e);
                }
            };

        if let Ok(mut slot) = self.shared.endpoint.lock() {
            *slot = Some(endpoint.to_owned());
        }
        self.shared.install(sink).await;

        let (stop_tx, stop_rx) = oneshot::channel();
        let read_loop = ReadLoop {
            connector: Arc::clone(&self.connector),
            handler: Arc::clone(&self.handler),
            shared: Arc::clone(&self.shared),
            endpoint: endpoint.to_owned(),
            config: self.config,
        };
        let task = tokio::spawn(read_loop.run(stream, stop_rx));
        *lifecycle = Some(ReadLoopHandle {
            stop: stop_tx,
            task,
        });

        info!(endpoint, "session connected");
        Ok(())
    }

    /// Close the stream and stop the read loop.
    ///
    /// Idempotent. Returns only after the read loop has exited.
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(handle) = lifecycle.take() else {
            return;
        };
        if self.stop(handle).await {
            info!("session disconnected");
        }
    }

    /// Stop and join a read loop. Returns `false` if it had already given up.
    async fn stop(&self, handle: ReadLoopHandle) -> bool {
        // The loop publishes `Disconnected` just before it exits after giving up.
        let gave_up = handle.task.is_finished() || self.state() == SessionState::Disconnected;
        if !gave_up {
            self.shared.set_state(SessionState::Disconnecting);
        }

        let _ = handle.stop.send(());
        if let Err(e) = handle.task.await {
            warn!(error = %e, "read loop task failed");
        }
        if gave_up {
            return false;
        }

        self.shared.set_state(SessionState::Disconnected);
        self.handler.on_stream_lost();
        true
    }

    /// Write one message to the stream.
    ///
    /// Concurrent sends are serialized; returns once the message has been
    /// handed to the stream, not when it is delivered.
    pub async fn send(&self, message: String) -> Result<(), TransportError> {
        let mut writer = self.shared.writer.lock().await;
        let sink = writer.as_mut().ok_or(TransportError::NotConnected)?;
        trace!(len = message.len(), "sending message");
        sink.send(message).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Whether a stream is open and usable.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Endpoint of the current (or last) stream.
    pub fn endpoint(&self) -> Option<String> {
        self.shared.endpoint.lock().ok().and_then(|slot| slot.clone())
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .field("config", &self.config)
            .finish()
    }
}

async fn open_stream(
    connector: &dyn Connector,
    endpoint: &str,
    timeout: Duration,
) -> Result<(WireSink, WireStream), TransportError> {
    match tokio::time::timeout(timeout, connector.open(endpoint)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::ConnectionFailed {
            endpoint: endpoint.to_owned(),
            reason: format!("timed out after {timeout:?}"),
        }),
    }
}

enum Reconnect {
    Opened(WireSink, WireStream),
    Stopped,
    GaveUp,
}

/// Background reader of one session.
struct ReadLoop {
    connector: Arc<dyn Connector>,
    handler: Arc<dyn MessageHandler>,
    shared: Arc<Shared>,
    endpoint: String,
    config: SessionConfig,
}

impl ReadLoop {
    async fn run(self, first: WireStream, mut stop: oneshot::Receiver<()>) {
        let mut stream = first;
        loop {
            let stopped = self.pump(&mut stream, &mut stop).await;
            drop(stream);

            if stopped {
                self.shared.close_writer(true).await;
                debug!(endpoint = %self.endpoint, "read loop stopped");
                return;
            }

            self.shared.close_writer(false).await;
            self.handler.on_stream_lost();

            match self.reconnect(&mut stop).await {
                Reconnect::Opened(sink, next) => {
                    self.shared.install(sink).await;
                    info!(endpoint = %self.endpoint, "session reconnected");
                    stream = next;
                }
                Reconnect::Stopped => {
                    debug!(endpoint = %self.endpoint, "read loop stopped while reconnecting");
                    return;
                }
                Reconnect::GaveUp => {
                    self.shared.set_state(SessionState::Disconnected);
                    warn!(endpoint = %self.endpoint, "stream lost; not reconnecting");
                    return;
                }
            }
        }
    }

    /// Dispatch messages until the stream ends (`false`) or stop is
    /// requested (`true`).
    async fn pump(&self, stream: &mut WireStream, stop: &mut oneshot::Receiver<()>) -> bool {
        loop {
            tokio::select! {
                biased;
                _ = &mut *stop => return true,
                next = stream.next() => match next {
                    Some(Ok(message)) => {
                        trace!(len = message.len(), "message received");
                        self.handler.on_message(message);
                    }
                    Some(Err(e)) => {
                        warn!(endpoint = %self.endpoint, error = %e, "stream failed");
                        return false;
                    }
                    None => {
                        debug!(endpoint = %self.endpoint, "stream closed by peer");
                        return false;
                    }
                },
            }
        }
    }

    async fn reconnect(&self, stop: &mut oneshot::Receiver<()>) -> Reconnect {
        let mut attempt = 0u32;
        loop {
            let Some(delay) = self.config.reconnect.delay(attempt) else {
                return Reconnect::GaveUp;
            };
            self.shared.set_state(SessionState::Connecting);

            tokio::select! {
                biased;
                _ = &mut *stop => return Reconnect::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }

            let opened = tokio::select! {
                biased;
                _ = &mut *stop => return Reconnect::Stopped,
                result = open_stream(self.connector.as_ref(), &self.endpoint, self.config.connect_timeout) => result,
            };

            match opened {
                Ok((sink, stream)) => return Reconnect::Opened(sink, stream),
                Err(e) => {
                    warn!(endpoint = %self.endpoint, attempt, error = %e, "reconnect failed");
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
