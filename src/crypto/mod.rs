//! Client identity: Ed25519 keys and the address derived from them.

mod address;
mod keys;

pub use address::ClientAddress;
pub use keys::KeyPair;
