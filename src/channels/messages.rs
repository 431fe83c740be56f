//! Wire format for auxiliary data channel messages

use serde::{Deserialize, Serialize};

/// Maximum auxiliary message size in bytes.
///
/// SCTP messages beyond ~16 KiB are fragmented or rejected by common
/// peers; auxiliary messages are small structured records, so the cap
/// leaves ample headroom.
pub const MAX_AUX_MESSAGE_SIZE: usize = 16 * 1024;

/// A structured message carried over the auxiliary data channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum AuxMessage {
    /// JSON payload for structured data (score updates, markers)
    Json(serde_json::Value),

    /// UTF-8 text payload
    Text(String),

    /// Binary payload, base64-encoded on the wire
    #[serde(with = "base64_bytes")]
    Binary(Vec<u8>),
}

impl AuxMessage {
    /// Create a JSON message from a serializable value
    pub fn json<T: Serialize>(value: &T) -> crate::Result<Self> {
        let json_value = serde_json::to_value(value).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to build aux message: {}", e))
        })?;
        Ok(AuxMessage::Json(json_value))
    }

    /// Create a text message
    pub fn text(text: impl Into<String>) -> Self {
        AuxMessage::Text(text.into())
    }

    /// Create a binary message
    pub fn binary(data: Vec<u8>) -> Self {
        AuxMessage::Binary(data)
    }

    /// Approximate payload size in bytes
    pub fn size(&self) -> usize {
        match self {
            AuxMessage::Json(v) => v.to_string().len(),
            AuxMessage::Text(t) => t.len(),
            AuxMessage::Binary(b) => b.len(),
        }
    }

    /// Check if this message exceeds the maximum size
    pub fn exceeds_max_size(&self) -> bool {
        self.size() > MAX_AUX_MESSAGE_SIZE
    }

    /// Serialize for transmission
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to serialize aux message: {}", e))
        })
    }

    /// Deserialize from received bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            crate::Error::SerializationError(format!("Failed to deserialize aux message: {}", e))
        })
    }

    /// Get the JSON payload if this is a JSON message
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            AuxMessage::Json(v) => Some(v),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
