//! Client addresses.

use std::fmt;

use super::keys::KeyPair;
use crate::core::ADDRESS_SEPARATOR;

/// Routing address of a client: `identifier.public_key_hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientAddress {
    identifier: String,
    public_key: String,
}

impl ClientAddress {
    /// Address of `keys` under `identifier`.
    pub fn derive(identifier: &str, keys: &KeyPair) -> Self {
        Self {
            identifier: identifier.to_owned(),
            public_key: keys.public_key_hex(),
        }
    }

    /// Split an address at its last separator.
    ///
    /// Identifiers may contain the separator; public key encodings never do.
    /// Returns `None` when there is no separator.
    pub fn parse(address: &str) -> Option<Self> {
        let (identifier, public_key) = address.rsplit_once(ADDRESS_SEPARATOR)?;
        Some(Self {
            identifier: identifier.to_owned(),
            public_key: public_key.to_owned(),
        })
    }

    /// The identifier part.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The public key encoding part.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.identifier, ADDRESS_SEPARATOR, self.public_key)
    }
}
