//! Session participants

use serde::{Deserialize, Serialize};

/// Which side of the interview a participant is on.
///
/// The interviewer is the caller: it produces the offer. The candidate
/// answers. Role names double as participant addresses in signaling,
/// which is unambiguous in a two-party session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The interviewer; initiates the call
    Interviewer,
    /// The candidate; answers the call
    Candidate,
}

impl Role {
    /// Role name, also used as the signaling address
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Interviewer => "interviewer",
            Role::Candidate => "candidate",
        }
    }

    /// The other side of the session
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Interviewer => Role::Candidate,
            Role::Candidate => Role::Interviewer,
        }
    }

    /// Whether this role initiates the offer
    pub fn is_caller(&self) -> bool {
        matches!(self, Role::Interviewer)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant of a session.
///
/// `online` on the remote participant becomes true only after a verified
/// network-level connection, not merely after a session description was
/// received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name
    pub name: String,
    /// Side of the interview
    pub role: Role,
    /// Whether media is flowing for this participant
    pub online: bool,
    /// Whether the participant's audio is enabled
    pub audio_enabled: bool,
    /// Whether the participant's video is enabled
    pub video_enabled: bool,
}

impl Participant {
    /// Create a participant that is not yet online
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            online: false,
            audio_enabled: false,
            video_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_is_symmetric() {
        assert_eq!(Role::Interviewer.counterpart(), Role::Candidate);
        assert_eq!(Role::Candidate.counterpart(), Role::Interviewer);
    }

    #[test]
    fn test_interviewer_is_caller() {
        assert!(Role::Interviewer.is_caller());
        assert!(!Role::Candidate.is_caller());
    }

    #[test]
    fn test_new_participant_starts_offline() {
        let p = Participant::new("Dana", Role::Candidate);
        assert!(!p.online);
        assert!(!p.audio_enabled);
        assert!(!p.video_enabled);
    }
}
