//! Ed25519 key management
//!
//! The signing key identifies the client to other clients: its verify key is
//! part of the client address and every outbound payload is signed with it.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::core::{KeyError, PUBLIC_KEY_SIZE, SEED_SIZE};

/// A long-term Ed25519 keypair.
///
/// The signing key is zeroized on drop and never leaves this type.
pub struct KeyPair {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Derive a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Derive a keypair from a hex encoded 32-byte seed.
    pub fn from_hex_seed(seed: &str) -> Result<Self, KeyError> {
        let mut decoded = hex::decode(seed.trim()).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
        if decoded.len() != SEED_SIZE {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(KeyError::InvalidLength {
                expected: SEED_SIZE,
                actual,
            });
        }

        let mut bytes = Zeroizing::new([0u8; SEED_SIZE]);
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_seed(&bytes))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    /// The verify key.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.verifying.as_bytes()
    }

    /// The verify key as lower-case hex, as used in addresses.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying.as_bytes())
    }

    /// The verify key, for checking signatures.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying
    }

    /// Detached signature over `message`, lower-case hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SIGNATURE_SIZE;
    use ed25519_dalek::{Signature, Verifier};

    const SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn test_keypair_generation() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();

        assert_ne!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.public_key_hex().len(), PUBLIC_KEY_SIZE * 2);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = KeyPair::from_hex_seed(SEED).unwrap();
        let b = KeyPair::from_seed(&[1u8; SEED_SIZE]);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_invalid_seed() {
        assert!(matches!(
            KeyPair::from_hex_seed("not hex"),
            Err(KeyError::InvalidEncoding(_))
        ));
        assert_eq!(
            KeyPair::from_hex_seed("0102").unwrap_err(),
            KeyError::InvalidLength {
                expected: SEED_SIZE,
                actual: 2
            }
        );
    }

    #[test]
    fn test_signature_verifies() {
        let kp = KeyPair::from_hex_seed(SEED).unwrap();
        let signature_hex = kp.sign_hex(b"hello");

        let bytes: [u8; SIGNATURE_SIZE] = hex::decode(&signature_hex).unwrap().try_into().unwrap();
        let signature = Signature::from_bytes(&bytes);
        assert!(kp.verifying_key().verify(b"hello", &signature).is_ok());
        assert!(kp.verifying_key().verify(b"other", &signature).is_err());
    }

    #[test]
    fn test_debug_hides_signing_key() {
        let kp = KeyPair::from_hex_seed(SEED).unwrap();
        let rendered = format!("{kp:?}");
        assert!(rendered.contains(&kp.public_key_hex()));
        assert!(!rendered.contains(SEED));
    }
}
