//! Seams to the outside world.
//!
//! The session only needs an ordered, reliable, bidirectional message stream
//! and a way to learn which relay serves an address. Both are traits so the
//! websocket and JSON-RPC implementations can be swapped for in-process ones.

use std::pin::Pin;

use futures::Sink;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use super::error::{LookupError, TransportError};

/// Write half of an open stream.
pub type WireSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Read half of an open stream. Ends when the stream is closed.
pub type WireStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens physical message streams.
///
/// # Example
///
/// ```ignore
/// struct Loopback;
///
/// impl Connector for Loopback {
///     fn open<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, Result<(WireSink, WireStream), TransportError>> {
///         Box::pin(async move { dial(endpoint).await })
///     }
/// }
/// ```
pub trait Connector: Send + Sync + 'static {
    /// Open a stream to `endpoint`, resolving once it is usable.
    fn open<'a>(
        &'a self,
        endpoint: &'a str,
    ) -> BoxFuture<'a, Result<(WireSink, WireStream), TransportError>>;
}

/// Maps a client address to the relay endpoint serving it.
pub trait EndpointResolver: Send + Sync + 'static {
    /// Resolve the endpoint for `address`.
    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<String, LookupError>>;
}
