//! Error types for the relay client.
//!
//! One enum per layer; higher layers wrap lower ones with `#[from]`.

use std::time::Duration;

use thiserror::Error;

/// Errors when decoding an inbound message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// Valid JSON but not an object.
    #[error("message is not an object")]
    NotAnObject,

    /// No tag member.
    #[error("missing tag")]
    MissingTag,

    /// Tag member is not a string.
    #[error("tag is not a string")]
    InvalidTag,

    /// A required field is absent or has the wrong type.
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
}

/// Errors of the physical stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The stream could not be opened.
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectionFailed {
        /// Endpoint that was dialed.
        endpoint: String,
        /// Underlying cause.
        reason: String,
    },

    /// No stream is open.
    #[error("not connected")]
    NotConnected,

    /// Writing to the stream failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the stream failed.
    #[error("stream error: {0}")]
    Stream(String),
}

impl TransportError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotConnected)
    }
}

/// Errors of a correlated request/response exchange.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request could not be written.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No matching response arrived in time.
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        /// Method that was called.
        method: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The stream went away while the call was outstanding.
    #[error("session closed while {method} was pending")]
    SessionClosed {
        /// Method that was called.
        method: String,
    },

    /// The relay answered with a non-zero error code.
    #[error("remote error {code}: {description}")]
    Remote {
        /// Error code reported by the relay.
        code: i64,
        /// Error description reported by the relay.
        description: String,
    },

    /// The response could not be interpreted.
    #[error("malformed message: {0}")]
    Malformed(#[from] DecodeError),

    /// The request could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RpcError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Timeout { .. } | Self::SessionClosed { .. } => true,
            Self::Remote { .. } | Self::Malformed(_) | Self::Encode(_) => false,
        }
    }

    /// Code and description of a remote error.
    pub fn remote(&self) -> Option<(i64, &str)> {
        match self {
            Self::Remote { code, description } => Some((*code, description.as_str())),
            _ => None,
        }
    }
}

/// Errors of the bootstrap lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The lookup service could not be reached.
    #[error("lookup service unreachable: {0}")]
    Unreachable(String),

    /// The lookup service reported an error.
    #[error("lookup failed with code {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The lookup service answered with something unexpected.
    #[error("invalid lookup response: {0}")]
    InvalidResponse(String),
}

/// Errors when loading key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Seed is not valid hex.
    #[error("seed is not valid hex: {0}")]
    InvalidEncoding(String),

    /// Seed has the wrong size.
    #[error("seed must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },
}

/// Errors surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bootstrap lookup failed.
    #[error("bootstrap failed: {0}")]
    Lookup(#[from] LookupError),

    /// Stream error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Request/response error, including remote errors.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Key material error.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Code and description of a remote error, verbatim.
    pub fn remote(&self) -> Option<(i64, &str)> {
        match self {
            Self::Rpc(e) => e.remote(),
            _ => None,
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Lookup(_) => true,
            Self::Transport(e) => e.is_retryable(),
            Self::Rpc(e) => e.is_retryable(),
            Self::Key(_) | Self::Config(_) => false,
        }
    }
}
