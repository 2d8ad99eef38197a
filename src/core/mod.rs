//! Core types shared by every layer: envelopes, packets, errors, constants
//! and the transport/bootstrap seams.

mod constants;
mod envelope;
mod error;
mod packet;
mod traits;

pub use constants::*;
pub use envelope::*;
pub use error::*;
pub use packet::*;
pub use traits::*;
