//! Error types for the interview session core

/// Result type alias using the session core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or running a session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera/microphone access was refused by the user or platform
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    /// A requested capture device is missing or already claimed
    #[error("Media device unavailable: {0}")]
    DeviceUnavailable(String),

    /// `join` was called on a session that is already joined
    #[error("Session already joined")]
    AlreadyJoined,

    /// An action was invoked while the session is not in a compatible state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The native transport reported a failed connection
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling transport error
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// ICE candidate error
    #[error("ICE candidate error: {0}")]
    IceCandidateError(String),

    /// Data channel error
    #[error("Data channel error: {0}")]
    DataChannelError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnectionError(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error came from local media acquisition
    pub fn is_media_error(&self) -> bool {
        matches!(
            self,
            Error::PermissionDenied(_) | Error::DeviceUnavailable(_) | Error::MediaTrackError(_)
        )
    }

    /// Check if this error is a programming/usage error rather than a
    /// runtime failure
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::AlreadyJoined | Error::InvalidState(_))
    }

    /// Check if this error came from session-description or candidate
    /// negotiation
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            Error::NegotiationFailed(_)
                | Error::SdpError(_)
                | Error::IceCandidateError(_)
                | Error::PeerConnectionError(_)
        )
    }

    /// Remediation text for errors the user can act on.
    ///
    /// Presentation layers branch on this to suggest a fix instead of
    /// showing a generic failure.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied(_) => {
                Some("grant camera and microphone access, then rejoin")
            }
            Error::DeviceUnavailable(_) => {
                Some("check that a camera and microphone are connected and not in use elsewhere")
            }
            Error::NegotiationFailed(_) => {
                Some("check network connectivity; restrictive networks need a TURN server")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PermissionDenied("camera".to_string());
        assert_eq!(err.to_string(), "Media permission denied: camera");

        let err = Error::AlreadyJoined;
        assert_eq!(err.to_string(), "Session already joined");
    }

    #[test]
    fn test_error_is_media_error() {
        assert!(Error::PermissionDenied("mic".to_string()).is_media_error());
        assert!(Error::DeviceUnavailable("cam".to_string()).is_media_error());
        assert!(!Error::AlreadyJoined.is_media_error());
    }

    #[test]
    fn test_error_is_usage_error() {
        assert!(Error::AlreadyJoined.is_usage_error());
        assert!(Error::InvalidState("test".to_string()).is_usage_error());
        assert!(!Error::SdpError("test".to_string()).is_usage_error());
    }

    #[test]
    fn test_error_is_negotiation_error() {
        assert!(Error::NegotiationFailed("ice".to_string()).is_negotiation_error());
        assert!(Error::SdpError("parse".to_string()).is_negotiation_error());
        assert!(!Error::PermissionDenied("cam".to_string()).is_negotiation_error());
    }

    #[test]
    fn test_user_hint_distinguishes_failures() {
        let permission = Error::PermissionDenied("camera".to_string());
        let negotiation = Error::NegotiationFailed("ice".to_string());

        assert_ne!(permission.user_hint(), negotiation.user_hint());
        assert!(permission.user_hint().is_some());
        assert!(Error::InvalidState("x".to_string()).user_hint().is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "device node missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::IoError(_)));
    }
}
