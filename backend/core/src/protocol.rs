//! Wire protocol spoken with browser clients.
//!
//! Every frame is a JSON object tagged by `type`. The relay only inspects the
//! routing fields; everything else is carried through untouched.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// The envelopes accepted from and delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Client -> Relay -> Clients: "this is my public key"
    #[serde(rename = "exchangePublicKeys", rename_all = "camelCase")]
    KeyAnnouncement { sender_public_key: String },
    /// Client -> Relay -> holder(s) of `receiverPublicKey`
    #[serde(rename = "encryptedMessage")]
    EncryptedPayload(EncryptedPayload),
}

/// An opaque encrypted message. Only `receiver_public_key` is read by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub receiver_public_key: String,
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,
}

impl Envelope {
    /// Build the announcement sent to other clients for `key`.
    pub fn announce(key: impl Into<String>) -> Self {
        Envelope::KeyAnnouncement {
            sender_public_key: key.into(),
        }
    }

    /// Wire name of this envelope's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::KeyAnnouncement { .. } => "exchangePublicKeys",
            Envelope::EncryptedPayload(_) => "encryptedMessage",
        }
    }

    /// Reject envelopes that parse but are missing a routing field.
    fn validate(self) -> Result<Self, RelayError> {
        match &self {
            Envelope::KeyAnnouncement { sender_public_key } if sender_public_key.is_empty() => {
                Err(RelayError::decode("exchangePublicKeys without senderPublicKey"))
            }
            Envelope::EncryptedPayload(p) if p.receiver_public_key.is_empty() => {
                Err(RelayError::decode("encryptedMessage without receiverPublicKey"))
            }
            Envelope::EncryptedPayload(p) if p.ciphertext.is_empty() => {
                Err(RelayError::decode("encryptedMessage without ciphertext"))
            }
            _ => Ok(self),
        }
    }
}

/// Decode one frame. Unknown `type`s, malformed JSON and missing routing
/// fields all come back as [`RelayError::Decode`].
pub fn decode(frame: &[u8]) -> Result<Envelope, RelayError> {
    let envelope: Envelope = serde_json::from_slice(frame)?;
    envelope.validate()
}

/// Encode an envelope as a JSON text frame.
pub fn encode(envelope: &Envelope) -> Result<String, RelayError> {
    serde_json::to_string(envelope).map_err(|e| RelayError::Other(e.into()))
}
