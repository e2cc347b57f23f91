//! Signaling protocol types.
//!
//! Every message rides the relay as a JSON object of the form
//! `{"event": <name>, "payload": {...}}`. The relay forwards it to the other
//! participant of the match without looking inside. Field names inside the
//! payload are camelCase to match what browser peers send.

use duet_common::MatchId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the relay.
pub mod events {
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const CALL_ENDED: &str = "call-ended";
    pub const PARTNER_MUTED: &str = "partner_muted";
    pub const PARTNER_UNMUTED: &str = "partner_unmuted";
    pub const PARTNER_LEFT: &str = "partner_left";
    pub const MATCH_TIMEOUT: &str = "match_timeout";
}

// ---------------------------------------------------------------------------
// Roles and negotiation payloads
// ---------------------------------------------------------------------------

/// Which side of the match drives negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates and publishes the offer.
    Initiator,
    /// Waits for an offer and answers it.
    Responder,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initiator" | "caller" => Ok(Role::Initiator),
            "responder" | "callee" => Ok(Role::Responder),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An SDP blob tagged with whether it is an offer or an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A network candidate discovered by one side's negotiation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u32>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Discriminant of a [`SignalMessage`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    CallEnded,
    PartnerMuted,
    PartnerUnmuted,
    PartnerLeft,
    MatchTimeout,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::Offer,
        SignalKind::Answer,
        SignalKind::IceCandidate,
        SignalKind::CallEnded,
        SignalKind::PartnerMuted,
        SignalKind::PartnerUnmuted,
        SignalKind::PartnerLeft,
        SignalKind::MatchTimeout,
    ];

    /// The event name this kind travels under.
    pub fn event_name(self) -> &'static str {
        match self {
            SignalKind::Offer => events::OFFER,
            SignalKind::Answer => events::ANSWER,
            SignalKind::IceCandidate => events::ICE_CANDIDATE,
            SignalKind::CallEnded => events::CALL_ENDED,
            SignalKind::PartnerMuted => events::PARTNER_MUTED,
            SignalKind::PartnerUnmuted => events::PARTNER_UNMUTED,
            SignalKind::PartnerLeft => events::PARTNER_LEFT,
            SignalKind::MatchTimeout => events::MATCH_TIMEOUT,
        }
    }
}

/// A message exchanged over the signaling channel.
///
/// The first four kinds are produced and consumed by the call core. Mute
/// announcements travel between peers; `partner_left` and `match_timeout`
/// come from the matcher and may omit the match id, in which case they
/// refer to whatever match is currently bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum SignalMessage {
    #[serde(rename = "offer")]
    Offer {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        sdp: String,
    },
    #[serde(rename = "answer")]
    Answer {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        sdp: String,
    },
    #[serde(rename = "ice-candidate")]
    IceCandidate {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        candidate: IceCandidate,
    },
    #[serde(rename = "call-ended")]
    CallEnded {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "partner_muted")]
    PartnerMuted {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "partner_unmuted")]
    PartnerUnmuted {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "partner_left")]
    PartnerLeft {
        #[serde(rename = "matchId", default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
    },
    #[serde(rename = "match_timeout")]
    MatchTimeout {
        #[serde(rename = "matchId", default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
    },
}

impl SignalMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalMessage::Offer { .. } => SignalKind::Offer,
            SignalMessage::Answer { .. } => SignalKind::Answer,
            SignalMessage::IceCandidate { .. } => SignalKind::IceCandidate,
            SignalMessage::CallEnded { .. } => SignalKind::CallEnded,
            SignalMessage::PartnerMuted { .. } => SignalKind::PartnerMuted,
            SignalMessage::PartnerUnmuted { .. } => SignalKind::PartnerUnmuted,
            SignalMessage::PartnerLeft { .. } => SignalKind::PartnerLeft,
            SignalMessage::MatchTimeout { .. } => SignalKind::MatchTimeout,
        }
    }

    /// The match this message is scoped to, if it names one.
    pub fn match_id(&self) -> Option<&MatchId> {
        match self {
            SignalMessage::Offer { match_id, .. }
            | SignalMessage::Answer { match_id, .. }
            | SignalMessage::IceCandidate { match_id, .. }
            | SignalMessage::CallEnded { match_id }
            | SignalMessage::PartnerMuted { match_id }
            | SignalMessage::PartnerUnmuted { match_id } => Some(match_id),
            SignalMessage::PartnerLeft { match_id } | SignalMessage::MatchTimeout { match_id } => {
                match_id.as_ref()
            }
        }
    }

    /// Whether this message belongs to `bound`. Matcher notifications without
    /// a match id apply to any bound match.
    pub fn is_for(&self, bound: &MatchId) -> bool {
        self.match_id().map_or(true, |id| id == bound)
    }

    pub fn event_name(&self) -> &'static str {
        self.kind().event_name()
    }
}
