//! Transport layer.
//!
//! Owns the physical stream to one relay endpoint:
//!
//! - **Session**: [`TransportSession`] with connect/disconnect lifecycle, a
//!   single read loop task and serialized sends
//! - **Lifecycle**: [`SessionState`]
//! - **Reconnect**: [`ReconnectPolicy`] and [`Backoff`]
//! - **Connectors**: [`WebSocketConnector`] (feature `websocket`) and the
//!   in-process [`MemoryConnector`]
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            RPC Correlator               │
//! ├─────────────────────────────────────────┤
//! │          Transport Session              │  ← This module
//! │   lifecycle, read loop, reconnects      │
//! ├─────────────────────────────────────────┤
//! │     Connector (websocket / memory)      │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
pub mod memory;
mod session;
mod timing;
#[cfg(feature = "websocket")]
mod websocket;

pub use connection::SessionState;
pub use memory::{MemoryConnector, MemoryPeer, MemoryRelay};
pub use session::{MessageHandler, SessionConfig, TransportSession};
pub use timing::{Backoff, ReconnectPolicy};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
