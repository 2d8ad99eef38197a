//! Request/response correlation over a transport session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{oneshot, watch};
use tracing::{debug, trace};

use super::pending::{PendingCall, PendingTable};
use crate::core::{Connector, DecodeError, Envelope, RpcError, TransportError};
use crate::transport::{MessageHandler, SessionConfig, SessionState, TransportSession};

/// An inbound message that answers no outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub enum Unsolicited {
    /// A well-formed envelope: a push, or a reply nobody waits for any more.
    Push(Envelope),
    /// Text that did not decode as an envelope.
    Malformed {
        /// The text as received.
        raw: String,
        /// Why decoding failed.
        error: DecodeError,
    },
}

/// Receives every inbound message that is not a response.
///
/// Called from the session's read loop; must not block.
pub trait UnsolicitedSink: Send + Sync + 'static {
    /// Handle one unsolicited message.
    fn interrupt(&self, message: Unsolicited);
}

/// Routes inbound messages to waiting callers or to the unsolicited sink.
struct Dispatcher {
    pending: Mutex<PendingTable>,
    sink: Arc<dyn UnsolicitedSink>,
}

impl Dispatcher {
    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageHandler for Dispatcher {
    fn on_message(&self, message: String) {
        let envelope = match Envelope::parse(&message) {
            Ok(envelope) => envelope,
            Err(error) => {
                self.sink.interrupt(Unsolicited::Malformed {
                    raw: message,
                    error,
                });
                return;
            }
        };

        let matched = self.table().take_for(&envelope);
        let Some((id, call)) = matched else {
            self.sink.interrupt(Unsolicited::Push(envelope));
            return;
        };

        trace!(id, tag = call.tag(), remaining = ?call.remaining(), "response correlated");
        if let Err(envelope) = call.complete(envelope) {
            debug!(id, "caller went away before its response arrived");
            self.sink.interrupt(Unsolicited::Push(envelope));
        }
    }

    fn on_stream_lost(&self) {
        let dropped = self.table().drain();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "failing calls outstanding on lost stream");
        }
    }
}

/// Removes a registration when the call finishes, times out or is dropped.
struct Registration<'a> {
    dispatcher: &'a Dispatcher,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.dispatcher.table().remove(self.id).is_some() {
            trace!(id = self.id, "registration withdrawn");
        }
    }
}

/// Turns the message stream of a [`TransportSession`] into awaitable calls.
///
/// Every request carries a fresh id. A response is matched by its echoed id;
/// a response without one completes the oldest outstanding call with the same
/// tag. Everything else goes to the [`UnsolicitedSink`].
pub struct RpcCorrelator {
    session: TransportSession,
    dispatcher: Arc<Dispatcher>,
    next_id: AtomicU64,
}

impl RpcCorrelator {
    /// Create a correlator over a fresh, disconnected session.
    pub fn new(
        connector: Arc<dyn Connector>,
        sink: Arc<dyn UnsolicitedSink>,
        config: SessionConfig,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher {
            pending: Mutex::new(PendingTable::default()),
            sink,
        });
        let handler: Arc<dyn MessageHandler> = dispatcher.clone();
        Self {
            session: TransportSession::new(connector, handler, config),
            dispatcher,
            next_id: AtomicU64::new(1),
        }
    }

    /// Send `method` with `params` and wait up to `timeout` for its response.
    ///
    /// The response is returned as received; embedded error codes are left
    /// for the caller to interpret.
    pub async fn call(
        &self,
        method: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Envelope, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = Envelope::request(method, id, params).to_text()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatcher
            .table()
            .register(id, PendingCall::new(method, reply_tx, timeout));
        let _registration = Registration {
            dispatcher: &self.dispatcher,
            id,
        };
        trace!(id, method, "request registered");

        let exchange = async {
            self.session.send(text).await?;
            reply_rx.await.map_err(|_| RpcError::SessionClosed {
                method: method.to_owned(),
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(id, method, ?timeout, "request timed out");
                Err(RpcError::Timeout {
                    method: method.to_owned(),
                    timeout,
                })
            }
        }
    }

    /// Number of requests still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.dispatcher.table().len()
    }

    /// Connect the underlying session.
    pub async fn connect(&self, endpoint: &str) -> Result<(), TransportError> {
        self.session.connect(endpoint).await
    }

    /// Disconnect the underlying session. Outstanding calls fail.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Watch session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// The underlying session.
    pub fn session(&self) -> &TransportSession {
        &self.session
    }
}

impl std::fmt::Debug for RpcCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcCorrelator")
            .field("session", &self.session)
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
