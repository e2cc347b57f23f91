use duet_common::{DuetError, MatchId};

/// Failures inside the call core.
///
/// None of these end a match on their own. The session absorbs them at its
/// boundary and only a terminal state change reaches the controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Permission denied or no capture device. The call continues receive-only.
    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    /// An offer or answer arrived while the endpoint could not accept it.
    #[error("signaling rejected: {0}")]
    SignalingRejected(String),

    /// A message for a match that is no longer bound.
    #[error("stale message for match {received} (bound to {expected})")]
    StaleMessage { expected: MatchId, received: MatchId },

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("signaling transport error: {0}")]
    Signaling(String),

    #[error("channel closed")]
    ChannelClosed,
}

impl From<CallError> for DuetError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Signaling(msg) => DuetError::Signaling(msg),
            other => DuetError::Call(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_message_display() {
        let err = CallError::StaleMessage {
            expected: MatchId::from("m2"),
            received: MatchId::from("m1"),
        };
        assert_eq!(err.to_string(), "stale message for match m1 (bound to m2)");
    }

    #[test]
    fn converts_into_duet_error() {
        let err: DuetError = CallError::MicrophoneUnavailable("permission denied".into()).into();
        assert!(matches!(err, DuetError::Call(_)));
        assert!(err.to_string().contains("permission denied"));

        let err: DuetError = CallError::Signaling("relay down".into()).into();
        assert!(matches!(err, DuetError::Signaling(_)));
    }
}
