//! Typed relay operations and push routing.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};
use tracing::{debug, trace, warn};

use crate::core::{
    Connector, DecodeError, Envelope, FIELD_ADDR, FIELD_RESULT, Packet, RpcError, TransportError, methods,
};
use crate::rpc::{RpcCorrelator, Unsolicited, UnsolicitedSink};
use crate::transport::{SessionConfig, SessionState};

/// Selects a block for [`ProtocolAdapter::get_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    /// Block at this height.
    Height(u64),
    /// Block with this hash.
    Hash(String),
}

impl BlockRef {
    fn to_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Self::Height(height) => params.insert("height".to_owned(), Value::from(*height)),
            Self::Hash(hash) => params.insert("hash".to_owned(), Value::from(hash.as_str())),
        };
        params
    }
}

/// Where pushes from the relay end up.
struct PushState {
    inbox_tx: mpsc::UnboundedSender<Packet>,
    inbox_rx: AsyncMutex<mpsc::UnboundedReceiver<Packet>>,
    latest_hash: RwLock<Option<String>>,
}

impl PushState {
    fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            inbox_tx,
            inbox_rx: AsyncMutex::new(inbox_rx),
            latest_hash: RwLock::new(None),
        }
    }

    fn deliver(&self, envelope: &Envelope) {
        match Packet::from_push(envelope) {
            Ok(packet) => {
                trace!(source = packet.source(), "packet received");
                // The receiver lives in `self`, so the inbox cannot be closed.
                let _ = self.inbox_tx.send(packet);
            }
            Err(error) => warn!(%error, "dropping undecodable packet"),
        }
    }

    fn update_hash(&self, envelope: &Envelope) {
        let Some(hash) = envelope.result().and_then(Value::as_str) else {
            warn!("dropping block hash update without a hash");
            return;
        };
        debug!(hash, "latest block hash updated");
        *self
            .latest_hash
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hash.to_owned());
    }
}

impl UnsolicitedSink for PushState {
    fn interrupt(&self, message: Unsolicited) {
        let envelope = match message {
            Unsolicited::Push(envelope) => envelope,
            Unsolicited::Malformed { raw, error } => {
                warn!(%error, len = raw.len(), "dropping malformed message");
                return;
            }
        };

        match envelope.tag() {
            methods::RECEIVE_PACKET => self.deliver(&envelope),
            methods::UPDATE_SIG_CHAIN_BLOCK_HASH => self.update_hash(&envelope),
            tag if envelope.id().is_some() => {
                debug!(tag, id = envelope.id(), "dropping response nobody waits for");
            }
            tag => warn!(tag, "dropping unknown push"),
        }
    }
}

/// The relay's websocket API as typed async operations.
///
/// Each operation checks the embedded error code of the response: a non-zero
/// code becomes [`RpcError::Remote`] with the relay's code and description.
/// Pushes are routed by tag: packets go to an ordered inbox, block hash
/// updates overwrite the cached hash.
pub struct ProtocolAdapter {
    rpc: RpcCorrelator,
    pushes: Arc<PushState>,
    call_timeout: Duration,
}

impl ProtocolAdapter {
    /// Create an adapter over a fresh, disconnected session.
    pub fn new(connector: Arc<dyn Connector>, session: SessionConfig, call_timeout: Duration) -> Self {
        let pushes = Arc::new(PushState::new());
        let sink: Arc<dyn UnsolicitedSink> = pushes.clone();
        Self {
            rpc: RpcCorrelator::new(connector, sink, session),
            pushes,
            call_timeout,
        }
    }

    async fn invoke(&self, method: &str, params: Map<String, Value>) -> Result<Value, RpcError> {
        self.rpc
            .call(method, params, self.call_timeout)
            .await?
            .into_result()
    }

    async fn invoke_count(&self, method: &str, params: Map<String, Value>) -> Result<u64, RpcError> {
        self.invoke(method, params)
            .await?
            .as_u64()
            .ok_or(RpcError::Malformed(DecodeError::MissingField(FIELD_RESULT)))
    }

    /// Height of the latest block.
    pub async fn get_latest_block_height(&self) -> Result<u64, RpcError> {
        self.invoke_count(methods::GET_LATEST_BLOCK_HEIGHT, Map::new())
            .await
    }

    /// A block by height or hash.
    pub async fn get_block(&self, block: BlockRef) -> Result<Value, RpcError> {
        self.invoke(methods::GET_BLOCK, block.to_params()).await
    }

    /// Number of neighbors of the relay node.
    pub async fn get_connection_count(&self) -> Result<u64, RpcError> {
        self.invoke_count(methods::GET_CONNECTION_COUNT, Map::new())
            .await
    }

    /// A transaction by hash.
    pub async fn get_transaction(&self, hash: &str) -> Result<Value, RpcError> {
        let mut params = Map::new();
        params.insert("hash".to_owned(), Value::from(hash));
        self.invoke(methods::GET_TRANSACTION, params).await
    }

    /// Keepalive.
    pub async fn heartbeat(&self) -> Result<Value, RpcError> {
        self.invoke(methods::HEARTBEAT, Map::new()).await
    }

    /// Number of websocket sessions the relay holds for `addr`.
    pub async fn get_session_count(&self, addr: &str) -> Result<u64, RpcError> {
        self.invoke_count(methods::GET_SESSION_COUNT, addr_params(addr))
            .await
    }

    /// Register `addr` as the client served by this session.
    pub async fn set_client(&self, addr: &str) -> Result<(), RpcError> {
        self.invoke(methods::SET_CLIENT, addr_params(addr)).await?;
        Ok(())
    }

    /// Hand a signed packet to the relay. Success is the relay's
    /// acknowledgement, not delivery.
    pub async fn send_packet(
        &self,
        destination: &str,
        payload: &str,
        signature: &str,
    ) -> Result<(), RpcError> {
        let params = Packet::outbound(destination, payload)
            .with_signature(signature)
            .to_send_params();
        self.invoke(methods::SEND_PACKET, params).await?;
        Ok(())
    }

    /// Next packet from the inbox, waiting for one if it is empty.
    ///
    /// Concurrent callers each receive distinct packets.
    pub async fn get_incoming_packet(&self) -> Packet {
        let mut inbox = self.pushes.inbox_rx.lock().await;
        match inbox.recv().await {
            Some(packet) => packet,
            None => std::future::pending().await,
        }
    }

    /// Next packet from the inbox if one is queued.
    pub fn try_incoming_packet(&self) -> Option<Packet> {
        self.pushes.inbox_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Latest signature chain block hash pushed by the relay.
    pub fn latest_block_hash(&self) -> Option<String> {
        self.pushes
            .latest_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Connect to a relay endpoint.
    pub async fn connect(&self, endpoint: &str) -> Result<(), TransportError> {
        self.rpc.connect(endpoint).await
    }

    /// Disconnect from the relay.
    pub async fn disconnect(&self) {
        self.rpc.disconnect().await;
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.rpc.state()
    }

    /// Watch session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.rpc.subscribe()
    }

    /// Timeout applied to every operation.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// The underlying correlator.
    pub fn correlator(&self) -> &RpcCorrelator {
        &self.rpc
    }
}

impl std::fmt::Debug for ProtocolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolAdapter")
            .field("rpc", &self.rpc)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn addr_params(addr: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(FIELD_ADDR.to_owned(), Value::from(addr));
    params
}
