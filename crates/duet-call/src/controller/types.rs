//! Configuration, status, events and commands for the call controller.

use std::time::Duration;

use duet_common::MatchId;
use serde::Serialize;

use crate::protocol::Role;
use crate::session::{SessionSettings, SessionState};
use crate::timer::format_remaining;
use crate::vad::VadConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Longest a connected call may last.
    pub max_duration: Duration,
    /// How long a terminal reason stays visible before the session is torn
    /// down.
    pub exit_grace: Duration,
    /// Remaining seconds at which the countdown is flagged as ending soon.
    pub ending_soon_secs: u32,
    /// Whether the initiator starts negotiating as soon as it is bound.
    pub audio_mode: bool,
    /// Tell the partner when we mute or unmute.
    pub announce_mute: bool,
    pub vad: VadConfig,
    pub session: SessionSettings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(600),
            exit_grace: Duration::from_secs(2),
            ending_soon_secs: 30,
            audio_mode: true,
            announce_mute: true,
            vad: VadConfig::default(),
            session: SessionSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal reasons
// ---------------------------------------------------------------------------

/// Why a call is ending, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// We hung up.
    Hangup,
    PartnerEnded,
    PartnerLeft,
    TimedOut,
}

impl TerminalReason {
    pub fn message(self) -> &'static str {
        match self {
            TerminalReason::Hangup => "Call ended",
            TerminalReason::PartnerEnded => "Partner ended the call",
            TerminalReason::PartnerLeft => "Partner left the chat",
            TerminalReason::TimedOut => "Call timed out",
        }
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Snapshot of everything a rendering surface shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallStatus {
    pub match_id: Option<MatchId>,
    pub role: Option<Role>,
    pub state: Option<SessionState>,
    pub mic_ready: bool,
    pub mic_error: Option<String>,
    pub muted: bool,
    pub partner_muted: bool,
    pub speaking: bool,
    pub remote_audio: bool,
    pub remaining_secs: u32,
    pub ending_soon: bool,
    pub terminal_reason: Option<TerminalReason>,
}

impl CallStatus {
    /// Remaining time as `m:ss`.
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining_secs)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications for the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Bound { match_id: MatchId, role: Role },
    MicReady,
    MicrophoneUnavailable(String),
    Connected,
    SpeakingChanged(bool),
    MuteChanged(bool),
    PartnerMuteChanged(bool),
    Tick { remaining_secs: u32 },
    TerminalReason(TerminalReason),
    /// The session for `match_id` has been torn down.
    Exited {
        match_id: MatchId,
        reason: Option<TerminalReason>,
    },
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum ControllerCommand {
    Bind { match_id: MatchId, role: Role },
    SetAudioEnabled(bool),
    ToggleMute,
    Hangup,
    PartnerLeft,
    MatchTimeout,
    Shutdown,
}
