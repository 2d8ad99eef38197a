//! Protocol layer: the relay API on top of the correlator.

mod adapter;

pub use adapter::{BlockRef, ProtocolAdapter};
