//! Signaling message types exchanged between session participants

use serde::{Deserialize, Serialize};

/// A signaling message addressed to one participant of one session.
///
/// The payload tag distinguishes session descriptions, trickled ICE
/// candidates and the end-of-session marker. Delivery is at-least-once
/// with no ordering guarantee across tags, so receivers must tolerate a
/// candidate arriving before its matching description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalingMessage {
    /// Session this message belongs to
    pub session_id: String,

    /// Sender participant id (role name within the session)
    pub from: String,

    /// Recipient participant id (role name within the session)
    pub to: String,

    /// The tagged payload
    #[serde(flatten)]
    pub payload: SignalingPayload,
}

/// Tagged payload union for signaling messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingPayload {
    /// Session description proposed by the caller
    Offer {
        /// SDP offer
        sdp: String,
    },

    /// Session description answering an offer
    Answer {
        /// SDP answer
        sdp: String,
    },

    /// A trickled network candidate
    IceCandidate {
        /// ICE candidate string
        candidate: String,

        /// SDP media section id the candidate belongs to
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp_mid: Option<String>,

        /// SDP media line index the candidate belongs to
        #[serde(skip_serializing_if = "Option::is_none")]
        sdp_mline_index: Option<u16>,
    },

    /// The sender has ended the session
    End,
}

impl SignalingMessage {
    /// Build an offer message
    pub fn offer(session_id: &str, from: &str, to: &str, sdp: String) -> Self {
        Self {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            payload: SignalingPayload::Offer { sdp },
        }
    }

    /// Build an answer message
    pub fn answer(session_id: &str, from: &str, to: &str, sdp: String) -> Self {
        Self {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            payload: SignalingPayload::Answer { sdp },
        }
    }

    /// Build an ICE candidate message
    pub fn ice_candidate(
        session_id: &str,
        from: &str,
        to: &str,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            payload: SignalingPayload::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            },
        }
    }

    /// Build an end-of-session message
    pub fn end(session_id: &str, from: &str, to: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            payload: SignalingPayload::End,
        }
    }

    /// Get the payload tag name
    pub fn kind(&self) -> &'static str {
        match self.payload {
            SignalingPayload::Offer { .. } => "offer",
            SignalingPayload::Answer { .. } => "answer",
            SignalingPayload::IceCandidate { .. } => "ice-candidate",
            SignalingPayload::End => "end",
        }
    }

    /// Convert message to JSON string
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::SerializationError(format!(
                "Failed to serialize signaling message: {}",
                e
            ))
        })
    }

    /// Parse message from JSON string
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::SerializationError(format!(
                "Failed to deserialize signaling message: {}",
                e
            ))
        })
    }
}
