//! Session lifecycle types.

use serde::Serialize;

use crate::error::CallError;

/// Lifecycle of a [`PeerConnectionSession`](super::PeerConnectionSession).
///
/// `Idle -> Negotiating -> Connected`, and `Ended` from anywhere. `Ended` is
/// terminal; a new match gets a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Negotiating,
    Connected,
    Ended,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Negotiating) | (Negotiating, Connected) | (Idle | Negotiating | Connected, Ended)
        )
    }

    pub fn is_ended(self) -> bool {
        self == SessionState::Ended
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Negotiating => "negotiating",
            SessionState::Connected => "connected",
            SessionState::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Whether the session holds a microphone capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MicrophoneStatus {
    #[default]
    Pending,
    Ready,
    /// Capture failed. The session carries on receive-only.
    Unavailable(String),
}

impl MicrophoneStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, MicrophoneStatus::Ready)
    }
}

/// What the session did with an incoming signaling message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    /// A candidate held until the remote description is set.
    Queued,
    /// Arrived after the session ended, or is not a negotiation message.
    Ignored,
    Dropped(CallError),
}
