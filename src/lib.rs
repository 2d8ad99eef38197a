//! # Overlay Relay Client
//!
//! Client-side session manager for a peer-addressed overlay network. A client
//! is known to the network by an address derived from its Ed25519 key; it
//! holds one message stream to the relay node serving that address, finds
//! that node through a bootstrap lookup, signs and sends packets to other
//! clients and receives packets addressed to it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Client Facade       (client)           │  identity, lookup, send/recv
//! ├─────────────────────────────────────────┤
//! │  Protocol Adapter    (protocol)         │  typed operations, pushes
//! ├─────────────────────────────────────────┤
//! │  RPC Correlator      (rpc)              │  request/response matching
//! ├─────────────────────────────────────────┤
//! │  Transport Session   (transport)        │  stream lifecycle, read loop
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `websocket` (default): [`transport::WebSocketConnector`]
//! - `bootstrap` (default): [`client::JsonRpcResolver`]
//!
//! ## Modules
//!
//! - [`core`]: Envelopes, packets, constants, error types and the
//!   connector/resolver traits
//! - [`transport`]: Transport session and connectors
//! - [`rpc`]: Request/response correlation
//! - [`protocol`]: Typed relay operations
//! - [`crypto`]: Keys and addresses
//! - [`client`]: The client facade
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use overlay_relay_client::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let (connector, mut relay) = MemoryConnector::pair();
//! let config = ClientConfig::builder().identifier("alice").build();
//! let client = OverlayClient::with_parts(
//!     config,
//!     Arc::new(connector),
//!     Arc::new(StaticResolver::new("relay:30002")),
//! )?;
//!
//! client.connect().await?;
//! let mut peer = relay.accept().await.expect("relay is alive");
//!
//! // Acknowledge every request.
//! tokio::spawn(async move {
//!     while let Some(request) = peer.recv_envelope().await {
//!         let _ = peer.reply_ok(&request, json!(null));
//!     }
//! });
//!
//! client.send("bob.0123abcd", "hello").await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;

pub mod transport;

pub mod rpc;

pub mod protocol;

pub mod crypto;

pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        ClientError, Connector, DecodeError, EndpointResolver, Envelope, KeyError, LookupError,
        Packet, RpcError, TransportError,
    };

    pub use crate::transport::{
        Backoff, MemoryConnector, MemoryPeer, MemoryRelay, ReconnectPolicy, SessionConfig,
        SessionState,
    };

    #[cfg(feature = "websocket")]
    pub use crate::transport::WebSocketConnector;

    pub use crate::protocol::{BlockRef, ProtocolAdapter};

    pub use crate::crypto::{ClientAddress, KeyPair};

    pub use crate::client::{ClientConfig, ClientConfigBuilder, OverlayClient, StaticResolver};

    #[cfg(feature = "bootstrap")]
    pub use crate::client::JsonRpcResolver;
}

// Re-export commonly used items at crate root
pub use crate::client::{ClientConfig, OverlayClient};
pub use crate::core::{ClientError, Envelope, Packet};
pub use crate::crypto::ClientAddress;
pub use crate::transport::SessionState;
