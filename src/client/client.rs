//! High-level relay client API.
//!
//! Provides [`OverlayClient`]: an identity, the relay session serving it, and
//! signed packet delivery to other clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::core::{
    ClientError, Connector, DEFAULT_CALL_TIMEOUT, DEFAULT_RPC_SERVER_ADDR, EndpointResolver, Packet,
};
use crate::crypto::{ClientAddress, KeyPair};
use crate::protocol::ProtocolAdapter;
use crate::transport::{ReconnectPolicy, SessionConfig, SessionState};

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Identifier part of the client address.
    pub identifier: String,

    /// Hex encoded 32-byte signing seed (optional, generated if not provided).
    pub seed: Option<String>,

    /// Bootstrap JSON-RPC server.
    pub rpc_server_addr: String,

    /// Time to wait for each relay response.
    pub call_timeout: Duration,

    /// Stream open timeout and reconnect behavior.
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            seed: None,
            rpc_server_addr: DEFAULT_RPC_SERVER_ADDR.to_owned(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Start building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("identifier", &self.identifier)
            .field("seed", &self.seed.as_ref().map(|_| "[REDACTED]"))
            .field("rpc_server_addr", &self.rpc_server_addr)
            .field("call_timeout", &self.call_timeout)
            .field("session", &self.session)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Set the signing seed (hex).
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.config.seed = Some(seed.into());
        self
    }

    /// Set the bootstrap server.
    pub fn rpc_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.rpc_server_addr = addr.into();
        self
    }

    /// Set the response timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set the stream open timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.session.connect_timeout = timeout;
        self
    }

    /// Set the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.session.reconnect = policy;
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// A client of the overlay network.
///
/// Owns its signing key, one relay session and the inbox of packets
/// addressed to it. All methods take `&self`; share the client behind an
/// `Arc` to use it from several tasks.
///
/// # Example
///
/// ```ignore
/// use overlay_relay_client::prelude::*;
///
/// let config = ClientConfig::builder()
///     .identifier("alice")
///     .seed(seed_hex)
///     .build();
///
/// let client = OverlayClient::new(config)?;
/// client.connect().await?;
///
/// client.send("bob.0123abcd...", "hello").await?;
/// let packet = client.recv().await;
/// println!("{:?} says {}", packet.source(), packet.payload());
///
/// client.disconnect().await;
/// ```
pub struct OverlayClient {
    keys: KeyPair,
    address: ClientAddress,
    resolver: Arc<dyn EndpointResolver>,
    api: ProtocolAdapter,
}

impl OverlayClient {
    /// Create a client that discovers its relay over JSON-RPC and talks to it
    /// over websocket.
    #[cfg(all(feature = "websocket", feature = "bootstrap"))]
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let resolver = super::JsonRpcResolver::new(config.rpc_server_addr.clone());
        Self::with_parts(
            config,
            Arc::new(crate::transport::WebSocketConnector::new()),
            Arc::new(resolver),
        )
    }

    /// Create a client with the given stream transport and relay discovery.
    pub fn with_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Result<Self, ClientError> {
        if config.identifier.is_empty() {
            return Err(ClientError::Config("identifier must not be empty".into()));
        }

        let keys = match &config.seed {
            Some(seed) => KeyPair::from_hex_seed(seed)?,
            None => KeyPair::generate(),
        };
        let address = ClientAddress::derive(&config.identifier, &keys);

        Ok(Self {
            keys,
            address,
            resolver,
            api: ProtocolAdapter::new(connector, config.session, config.call_timeout),
        })
    }

    /// Look up the relay serving this client and connect to it.
    ///
    /// A no-op when already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.api.state().is_connected() {
            return Ok(());
        }

        let address = self.address.to_string();
        let endpoint = self.resolver.resolve(&address).await?;
        self.api.connect(&endpoint).await?;
        info!(%address, %endpoint, "connected to relay");
        Ok(())
    }

    /// Close the relay session. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.api.disconnect().await;
    }

    /// Sign `payload` and hand it to the relay for `destination`.
    ///
    /// Returns once the relay acknowledged the packet.
    pub async fn send(&self, destination: &str, payload: &str) -> Result<(), ClientError> {
        let signature = self.keys.sign_hex(payload.as_bytes());
        self.api
            .send_packet(destination, payload, &signature)
            .await?;
        Ok(())
    }

    /// Next packet addressed to this client, in arrival order.
    ///
    /// Waits until one arrives; packets received before a disconnect stay
    /// queued.
    pub async fn recv(&self) -> Packet {
        self.api.get_incoming_packet().await
    }

    /// Next queued packet, without waiting.
    pub fn try_recv(&self) -> Option<Packet> {
        self.api.try_incoming_packet()
    }

    /// This client's address.
    pub fn address(&self) -> &ClientAddress {
        &self.address
    }

    /// Latest signature chain block hash pushed by the relay.
    pub fn latest_block_hash(&self) -> Option<String> {
        self.api.latest_block_hash()
    }

    /// The typed relay API, for operations beyond packet exchange.
    pub fn api(&self) -> &ProtocolAdapter {
        &self.api
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.api.state()
    }

    /// Watch session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.api.subscribe()
    }
}

impl std::fmt::Debug for OverlayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayClient")
            .field("address", &self.address.to_string())
            .field("state", &self.session_state())
            .finish_non_exhaustive()
    }
}
