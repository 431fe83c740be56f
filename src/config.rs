//! Configuration types for the interview session core

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::media::MediaConstraints;

/// Main configuration for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional; required on restrictive
    /// networks where STUN-only traversal fails)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Media kinds requested at `join`
    pub constraints: MediaConstraints,

    /// Label of the auxiliary data channel (live scores etc.)
    pub aux_channel_label: String,

    /// Delivery mode of the auxiliary data channel
    pub aux_channel_mode: DataChannelMode,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Data channel delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataChannelMode {
    /// Reliable, ordered delivery (default)
    Reliable,
    /// Unreliable, unordered delivery (lower latency, messages may drop)
    Unreliable,
}

impl DataChannelMode {
    /// Get the ordered setting for webrtc-rs
    pub fn ordered(&self) -> bool {
        match self {
            DataChannelMode::Reliable => true,
            DataChannelMode::Unreliable => false,
        }
    }

    /// Get the max retransmits setting for webrtc-rs
    pub fn max_retransmits(&self) -> Option<u16> {
        match self {
            DataChannelMode::Reliable => None,
            DataChannelMode::Unreliable => Some(0),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            constraints: MediaConstraints::default(),
            aux_channel_label: "scores".to_string(),
            aux_channel_mode: DataChannelMode::Reliable,
        }
    }
}

impl SessionConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - a STUN URL does not start with `stun:`
    /// - a TURN URL does not start with `turn:` or `turns:`
    /// - `constraints` requests no media kind at all
    /// - `aux_channel_label` is empty
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN URL must start with stun:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        if self.constraints.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one media kind (audio or video) is required".to_string(),
            ));
        }

        if self.aux_channel_label.is_empty() {
            return Err(Error::InvalidConfig(
                "aux_channel_label must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the native ICE server list from the configured STUN and TURN
    /// entries
    pub fn ice_servers(&self) -> Vec<RTCIceServer> {
        self.stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(self.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect()
    }

    /// Add TURN servers to this configuration
    ///
    /// Useful for chaining on `SessionConfig::default()`.
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }

    /// Set the media constraints requested at `join`
    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Set the auxiliary data channel label and mode
    pub fn with_aux_channel(mut self, label: &str, mode: DataChannelMode) -> Self {
        self.aux_channel_label = label.to_string();
        self.aux_channel_mode = mode;
        self
    }
}
