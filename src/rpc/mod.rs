//! RPC layer.
//!
//! [`RpcCorrelator`] sends tagged requests over a [`TransportSession`] and
//! matches inbound messages back to the callers awaiting them. Anything that
//! is not a response is handed to an [`UnsolicitedSink`].
//!
//! [`TransportSession`]: crate::transport::TransportSession

mod correlator;
mod pending;

pub use correlator::{RpcCorrelator, Unsolicited, UnsolicitedSink};
