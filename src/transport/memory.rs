//! In-process transport.
//!
//! [`MemoryConnector`] opens streams to a [`MemoryRelay`] living in the same
//! process. The relay side accepts one [`MemoryPeer`] per opened stream and
//! can read what the client sends, push messages, answer requests and drop
//! the stream. Used by the test suites and by applications embedding a relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::channel::mpsc as stream_channel;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::core::{
    Connector, Envelope, FIELD_DESC, FIELD_ERROR, FIELD_ID, FIELD_RESULT, TransportError, WireSink,
    WireStream,
};

/// Counters shared by a connector and its relay.
#[derive(Debug, Default)]
struct StreamStats {
    live: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
    refused: AtomicUsize,
}

/// Marks a stream as open for as long as any client half holds it.
struct LiveStream(Arc<StreamStats>);

impl LiveStream {
    fn open(stats: &Arc<StreamStats>) -> Arc<Self> {
        let live = stats.live.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(live, Ordering::SeqCst);
        stats.opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self(Arc::clone(stats)))
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client side of an in-process relay.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
}

impl MemoryConnector {
    /// Create a connector and the relay it connects to.
    pub fn pair() -> (Self, MemoryRelay) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StreamStats::default());
        (
            Self {
                accept: accept_tx,
                refuse: Arc::clone(&refuse),
                stats: Arc::clone(&stats),
            },
            MemoryRelay {
                accept: accept_rx,
                refuse,
                stats,
            },
        )
    }
}

impl Connector for MemoryConnector {
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BoxFuture<'a, Result<(WireSink, WireStream), TransportError>> {
        Box::pin(async move {
            if self.refuse.load(Ordering::SeqCst) {
                self.stats.refused.fetch_add(1, Ordering::SeqCst);
                return Err(TransportError::ConnectionFailed {
                    endpoint: endpoint.to_owned(),
                    reason: "connection refused".into(),
                });
            }

            let (to_relay, from_client) = stream_channel::unbounded::<String>();
            let (to_client, from_relay) = stream_channel::unbounded::<String>();
            let peer = MemoryPeer {
                endpoint: endpoint.to_owned(),
                inbound: from_client,
                outbound: to_client,
            };
            if self.accept.send(peer).is_err() {
                return Err(TransportError::ConnectionFailed {
                    endpoint: endpoint.to_owned(),
                    reason: "relay is gone".into(),
                });
            }

            let live = LiveStream::open(&self.stats);
            let write_live = Arc::clone(&live);
            let sink: WireSink = Box::pin(to_relay.sink_map_err(move |e| {
                let _ = &write_live;
                TransportError::Send(e.to_string())
            }));
            let stream: WireStream = from_relay
                .map(move |message| {
                    let _ = &live;
                    Ok(message)
                })
                .boxed();
            Ok((sink, stream))
        })
    }
}

/// Relay side: accepts streams opened by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryRelay {
    accept: mpsc::UnboundedReceiver<MemoryPeer>,
    refuse: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
}

impl MemoryRelay {
    /// Wait for the next stream. `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept.recv().await
    }

    /// Make subsequent opens fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Streams currently held open by clients.
    pub fn live_streams(&self) -> usize {
        self.stats.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams observed.
    pub fn peak_streams(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }

    /// Streams successfully opened so far.
    pub fn opened_streams(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    /// Opens rejected while refusing.
    pub fn refused_attempts(&self) -> usize {
        self.stats.refused.load(Ordering::SeqCst)
    }
}

/// Relay end of one stream.
#[derive(Debug)]
pub struct MemoryPeer {
    endpoint: String,
    inbound: stream_channel::UnboundedReceiver<String>,
    outbound: stream_channel::UnboundedSender<String>,
}

impl MemoryPeer {
    /// Endpoint the client dialed.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Next message from the client. `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.next().await
    }

    /// Next message from the client, parsed. Unparseable messages are skipped.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        while let Some(text) = self.recv().await {
            if let Ok(envelope) = Envelope::parse(&text) {
                return Some(envelope);
            }
        }
        None
    }

    /// Send raw text to the client.
    pub fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.outbound
            .unbounded_send(text.into())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Send an envelope to the client.
    pub fn push(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let text = envelope
            .to_text()
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.send(text)
    }

    /// Answer `request` with the given error code, description and result.
    ///
    /// The response echoes the request's tag and correlation id.
    pub fn reply(
        &self,
        request: &Envelope,
        code: i64,
        description: &str,
        result: Value,
    ) -> Result<(), TransportError> {
        let mut fields = Map::new();
        if let Some(id) = request.id() {
            fields.insert(FIELD_ID.to_owned(), Value::from(id));
        }
        fields.insert(FIELD_ERROR.to_owned(), Value::from(code));
        fields.insert(FIELD_DESC.to_owned(), Value::from(description));
        fields.insert(FIELD_RESULT.to_owned(), result);
        self.push(&Envelope::new(request.tag(), fields))
    }

    /// Answer `request` successfully.
    pub fn reply_ok(&self, request: &Envelope, result: Value) -> Result<(), TransportError> {
        self.reply(request, 0, "SUCCESS", result)
    }

    /// Drop the stream from the relay side.
    pub fn close(self) {}
}
