//! Application packets.

use serde_json::{Map, Value};

use super::constants::{FIELD_DEST, FIELD_DIGEST, FIELD_PAYLOAD, FIELD_SIGNATURE, FIELD_SRC};
use super::envelope::Envelope;
use super::error::DecodeError;

/// A packet exchanged with another client.
///
/// Outbound packets carry destination, payload and (once signed) signature.
/// Inbound packets carry source, payload and digest. Packets are values:
/// signing produces a new packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    source: Option<String>,
    destination: Option<String>,
    payload: String,
    digest: Option<String>,
    signature: Option<String>,
}

impl Packet {
    /// An unsigned outbound packet.
    pub fn outbound(destination: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            source: None,
            destination: Some(destination.into()),
            payload: payload.into(),
            digest: None,
            signature: None,
        }
    }

    /// An inbound packet as delivered by the relay.
    pub fn inbound(
        source: impl Into<String>,
        payload: impl Into<String>,
        digest: Option<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            destination: None,
            payload: payload.into(),
            digest,
            signature: None,
        }
    }

    /// A copy of this packet carrying `signature`.
    pub fn with_signature(&self, signature: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            ..self.clone()
        }
    }

    /// Decode an inbound packet from a `receivePacket` push.
    pub fn from_push(envelope: &Envelope) -> Result<Self, DecodeError> {
        let source = envelope
            .str_field(FIELD_SRC)
            .ok_or(DecodeError::MissingField(FIELD_SRC))?;
        let payload = envelope
            .str_field(FIELD_PAYLOAD)
            .ok_or(DecodeError::MissingField(FIELD_PAYLOAD))?;
        let digest = envelope.str_field(FIELD_DIGEST).map(str::to_owned);
        Ok(Self::inbound(source, payload, digest))
    }

    /// Parameters of a `sendPacket` request.
    pub fn to_send_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(dest) = &self.destination {
            params.insert(FIELD_DEST.to_owned(), Value::String(dest.clone()));
        }
        params.insert(FIELD_PAYLOAD.to_owned(), Value::String(self.payload.clone()));
        if let Some(signature) = &self.signature {
            params.insert(FIELD_SIGNATURE.to_owned(), Value::String(signature.clone()));
        }
        params
    }

    /// Source address (inbound packets).
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Destination address (outbound packets).
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Digest (inbound packets).
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Signature (signed outbound packets).
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Whether the packet has been signed.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_produces_new_packet() {
        let unsigned = Packet::outbound("bob.ab", "hello");
        let signed = unsigned.with_signature("00ff");

        assert!(!unsigned.is_signed());
        assert_eq!(signed.signature(), Some("00ff"));
        assert_eq!(signed.destination(), Some("bob.ab"));
        assert_eq!(signed.payload(), "hello");
    }

    #[test]
    fn test_send_params() {
        let params = Packet::outbound("bob.ab", "hello")
            .with_signature("00ff")
            .to_send_params();

        assert_eq!(params["Dest"], "bob.ab");
        assert_eq!(params["Payload"], "hello");
        assert_eq!(params["Signature"], "00ff");
    }

    #[test]
    fn test_from_push() {
        let env = Envelope::parse(
            r#"{"Action":"receivePacket","Src":"src","Payload":"payload","Digest":"digest"}"#,
        )
        .unwrap();

        let packet = Packet::from_push(&env).unwrap();
        assert_eq!(packet, Packet::inbound("src", "payload", Some("digest".into())));
        assert_eq!(packet.destination(), None);
    }

    #[test]
    fn test_from_push_requires_source() {
        let env = Envelope::parse(r#"{"Action":"receivePacket","Payload":"x"}"#).unwrap();
        assert_eq!(
            Packet::from_push(&env).unwrap_err(),
            DecodeError::MissingField("Src")
        );
    }
}
