//! Protocol constants for the relay websocket API.
//!
//! Method names and field names are fixed by the relay node and MUST NOT be
//! changed.

use std::time::Duration;

// =============================================================================
// ADDRESSING
// =============================================================================

/// Separator between the identifier and the public key encoding of an address.
pub const ADDRESS_SEPARATOR: char = '.';

/// Ed25519 verify key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 seed (secret key) size.
pub const SEED_SIZE: usize = 32;

/// Ed25519 detached signature size.
pub const SIGNATURE_SIZE: usize = 64;

// =============================================================================
// ENVELOPE FIELDS
// =============================================================================

/// Envelope tag (method or push kind).
pub const FIELD_ACTION: &str = "Action";

/// Correlation id carried by requests and echoed by responses.
pub const FIELD_ID: &str = "Id";

/// Error code of a response (0 means success).
pub const FIELD_ERROR: &str = "Error";

/// Human readable error description of a response.
pub const FIELD_DESC: &str = "Desc";

/// Result payload of a response.
pub const FIELD_RESULT: &str = "Result";

/// Source address of an inbound packet.
pub const FIELD_SRC: &str = "Src";

/// Destination address of an outbound packet.
pub const FIELD_DEST: &str = "Dest";

/// Packet payload.
pub const FIELD_PAYLOAD: &str = "Payload";

/// Signature of an outbound packet.
pub const FIELD_SIGNATURE: &str = "Signature";

/// Digest of an inbound packet.
pub const FIELD_DIGEST: &str = "Digest";

/// Address argument of `setclient` and `getsessioncount`.
pub const FIELD_ADDR: &str = "Addr";

// =============================================================================
// METHODS
// =============================================================================

/// Relay API method names.
pub mod methods {
    /// Height of the current block.
    pub const GET_LATEST_BLOCK_HEIGHT: &str = "getlatestblockheight";

    /// Block by height or hash.
    pub const GET_BLOCK: &str = "getblock";

    /// Number of connections of the relay node.
    pub const GET_CONNECTION_COUNT: &str = "getconnectioncount";

    /// Transaction by hash.
    pub const GET_TRANSACTION: &str = "gettransaction";

    /// Keepalive.
    pub const HEARTBEAT: &str = "heartbeat";

    /// Number of websocket sessions of a host.
    pub const GET_SESSION_COUNT: &str = "getsessioncount";

    /// Register the client address with the relay node.
    pub const SET_CLIENT: &str = "setclient";

    /// Deliver a signed packet to another client.
    pub const SEND_PACKET: &str = "sendPacket";

    /// Push: a packet addressed to this client.
    pub const RECEIVE_PACKET: &str = "receivePacket";

    /// Push: latest signature chain block hash.
    pub const UPDATE_SIG_CHAIN_BLOCK_HASH: &str = "updateSigChainBlockHash";

    /// Bootstrap JSON-RPC: websocket address of the relay serving an address.
    pub const GET_WS_ADDR: &str = "getwsaddr";
}

// =============================================================================
// DEFAULTS
// =============================================================================

/// Bootstrap JSON-RPC server.
pub const DEFAULT_RPC_SERVER_ADDR: &str = "devnet-seed-0001.nkn.org:30003";

/// Time to wait for a correlated response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Time to wait for the physical stream to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL_MIN: Duration = Duration::from_millis(100);

/// Upper bound of the reconnect backoff.
pub const DEFAULT_RECONNECT_INTERVAL_MAX: Duration = Duration::from_millis(64_000);

/// Time to wait for the bootstrap lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
