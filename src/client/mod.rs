//! Client Library
//!
//! High-level API for overlay clients.

mod bootstrap;
#[allow(clippy::module_inception)]
mod client;

pub use bootstrap::*;
pub use client::*;
