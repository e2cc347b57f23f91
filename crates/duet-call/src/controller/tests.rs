use std::sync::Arc;
use std::time::Duration;

use duet_common::MatchId;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::*;
use crate::loopback::{LoopbackDevices, LoopbackEndpointFactory};
use crate::protocol::{IceCandidate, Role, SignalKind, SignalMessage};
use crate::session::SessionState;
use crate::signaling::{MemoryRelay, MemorySignalingChannel};

const WAIT: Duration = Duration::from_secs(120);

struct Side {
    controller: CallController,
    events: mpsc::Receiver<CallEvent>,
    signaling: MemorySignalingChannel,
    devices: LoopbackDevices,
    endpoints: LoopbackEndpointFactory,
}

impl Side {
    fn spawn(config: ControllerConfig, signaling: MemorySignalingChannel) -> Self {
        Self::spawn_with(config, signaling, LoopbackDevices::new())
    }

    fn spawn_with(
        config: ControllerConfig,
        signaling: MemorySignalingChannel,
        devices: LoopbackDevices,
    ) -> Self {
        let endpoints = LoopbackEndpointFactory::new();
        let (controller, events) = CallController::spawn(
            config,
            Arc::new(signaling.clone()),
            Arc::new(devices.clone()),
            Arc::new(endpoints.clone()),
        );
        Self {
            controller,
            events,
            signaling,
            devices,
            endpoints,
        }
    }

    fn standalone(config: ControllerConfig) -> Self {
        Self::spawn(config, MemorySignalingChannel::standalone())
    }

    async fn bind(&mut self, match_id: &str, role: Role) {
        self.controller.bind(MatchId::from(match_id), role).await;
        self.wait_for(|e| matches!(e, CallEvent::Bound { .. })).await;
    }

    /// Next event satisfying `pred`, skipping the rest.
    async fn wait_for(&mut self, pred: impl Fn(&CallEvent) -> bool) -> CallEvent {
        self.collect_until(pred).await.pop().unwrap()
    }

    /// Every event up to and including the first one satisfying `pred`.
    async fn collect_until(&mut self, pred: impl Fn(&CallEvent) -> bool) -> Vec<CallEvent> {
        let events = &mut self.events;
        tokio::time::timeout(WAIT, async move {
            let mut seen = Vec::new();
            loop {
                let event = events.recv().await.expect("controller stopped");
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Let the controller drain everything currently queued.
    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn inject(&self, message: SignalMessage) {
        self.signaling.inject(message);
    }
}

fn config() -> ControllerConfig {
    ControllerConfig::default()
}

fn answer(match_id: &str) -> SignalMessage {
    SignalMessage::Answer {
        match_id: MatchId::from(match_id),
        sdp: "v=0".into(),
    }
}

fn offer(match_id: &str) -> SignalMessage {
    SignalMessage::Offer {
        match_id: MatchId::from(match_id),
        sdp: "v=0".into(),
    }
}

fn candidate(match_id: &str, n: u32) -> SignalMessage {
    SignalMessage::IceCandidate {
        match_id: MatchId::from(match_id),
        candidate: IceCandidate::new(format!("candidate:{n} 1 udp 1 10.1.0.{n} 5000 typ host")),
    }
}

fn is_connected(e: &CallEvent) -> bool {
    matches!(e, CallEvent::Connected)
}

fn is_exited(e: &CallEvent) -> bool {
    matches!(e, CallEvent::Exited { .. })
}

/// Initiator bound to `m1` and connected through an injected answer.
async fn connected_initiator(config: ControllerConfig) -> Side {
    let mut side = Side::standalone(config);
    side.bind("m1", Role::Initiator).await;
    side.inject(answer("m1"));
    side.wait_for(is_connected).await;
    side
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn initiator_and_responder_connect_over_relay() {
    let (a, b) = MemoryRelay::pair();
    let mut initiator = Side::spawn(config(), a);
    let mut responder = Side::spawn(config(), b);

    responder.bind("m1", Role::Responder).await;
    initiator.bind("m1", Role::Initiator).await;

    initiator.wait_for(is_connected).await;
    responder.wait_for(is_connected).await;
    responder.settle().await;

    assert_eq!(initiator.signaling.published_count(SignalKind::Offer), 1);
    assert_eq!(responder.signaling.published_count(SignalKind::Offer), 0);
    assert_eq!(responder.signaling.published_count(SignalKind::Answer), 1);
    assert_eq!(initiator.signaling.published_count(SignalKind::Answer), 0);

    let status = responder.controller.status().await;
    assert_eq!(status.state, Some(SessionState::Connected));
    assert!(status.remote_audio);
    assert!(status.mic_ready);

    // Candidates flowed both ways and were applied after the descriptions.
    let applied = initiator.endpoints.record(0).unwrap().applied_candidates;
    assert_eq!(applied.len(), 2);
    let applied = responder.endpoints.record(0).unwrap().applied_candidates;
    assert_eq!(applied.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_bind_is_absorbed() {
    let mut side = Side::standalone(config());
    side.bind("m1", Role::Initiator).await;
    side.controller.bind(MatchId::from("m1"), Role::Initiator).await;
    side.settle().await;

    assert_eq!(side.endpoints.created(), 1);
    assert_eq!(side.signaling.published_count(SignalKind::Offer), 1);
    assert_eq!(side.devices.opened(), 1);
    assert_eq!(
        side.controller.status().await.state,
        Some(SessionState::Negotiating)
    );
}

#[tokio::test(start_paused = true)]
async fn responder_never_initiates() {
    let mut side = Side::standalone(config());
    side.bind("m1", Role::Responder).await;
    side.controller.set_audio_enabled(true).await;
    side.settle().await;

    assert!(side.signaling.published().is_empty());
    assert_eq!(side.endpoints.created(), 0);
    assert_eq!(side.controller.status().await.state, Some(SessionState::Idle));
}

#[tokio::test(start_paused = true)]
async fn initiator_waits_for_audio_mode() {
    let mut side = Side::standalone(ControllerConfig {
        audio_mode: false,
        ..config()
    });
    side.bind("m1", Role::Initiator).await;
    side.settle().await;
    assert_eq!(side.signaling.published_count(SignalKind::Offer), 0);

    side.controller.set_audio_enabled(true).await;
    side.wait_for(|e| matches!(e, CallEvent::MicReady)).await;
    side.controller.set_audio_enabled(false).await;
    side.controller.set_audio_enabled(true).await;
    side.settle().await;
    assert_eq!(side.signaling.published_count(SignalKind::Offer), 1);
}

#[tokio::test(start_paused = true)]
async fn microphone_denial_keeps_match_alive() {
    let devices = LoopbackDevices::new();
    devices.set_denied(true);
    let mut side = Side::spawn_with(config(), MemorySignalingChannel::standalone(), devices);

    side.bind("m1", Role::Initiator).await;
    let event = side
        .wait_for(|e| matches!(e, CallEvent::MicrophoneUnavailable(_)))
        .await;
    assert_eq!(
        event,
        CallEvent::MicrophoneUnavailable("microphone unavailable: permission denied".into())
    );
    assert_eq!(side.signaling.published_count(SignalKind::Offer), 1);

    side.inject(answer("m1"));
    side.wait_for(is_connected).await;
    side.settle().await;
    let status = side.controller.status().await;
    assert!(!status.mic_ready);
    assert!(status.mic_error.is_some());
    assert_eq!(status.terminal_reason, None);
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn countdown_expiry_ends_once_with_notify() {
    let mut side = connected_initiator(ControllerConfig {
        max_duration: Duration::from_secs(3),
        ..config()
    })
    .await;

    let events = side.collect_until(is_exited).await;
    let ticks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CallEvent::Tick { remaining_secs } => Some(*remaining_secs),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![2, 1, 0]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CallEvent::TerminalReason(_)))
            .collect::<Vec<_>>(),
        vec![&CallEvent::TerminalReason(TerminalReason::TimedOut)]
    );
    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 1);
    assert_eq!(side.devices.active(), 0);

    // No further ticks once ended.
    side.settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(side.events.try_recv().is_err());
    let status = side.controller.status().await;
    assert_eq!(status.state, Some(SessionState::Ended));
    assert_eq!(status.remaining_secs, 0);
}

#[tokio::test(start_paused = true)]
async fn timer_only_starts_once_connected() {
    let mut side = Side::standalone(ControllerConfig {
        max_duration: Duration::from_secs(5),
        ..config()
    });
    side.bind("m1", Role::Initiator).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let status = side.controller.status().await;
    assert_eq!(status.remaining_secs, 5);
    assert_eq!(status.terminal_reason, None);
    assert_eq!(status.state, Some(SessionState::Negotiating));
}

#[tokio::test(start_paused = true)]
async fn status_flags_ending_soon() {
    let mut side = connected_initiator(ControllerConfig {
        max_duration: Duration::from_secs(40),
        ending_soon_secs: 30,
        ..config()
    })
    .await;

    side.wait_for(|e| matches!(e, CallEvent::Tick { remaining_secs: 31 }))
        .await;
    side.settle().await;
    assert!(!side.controller.status().await.ending_soon);

    side.wait_for(|e| matches!(e, CallEvent::Tick { remaining_secs: 30 }))
        .await;
    side.settle().await;
    let status = side.controller.status().await;
    assert!(status.ending_soon);
    assert_eq!(status.remaining_display(), "0:30");
}

#[tokio::test(start_paused = true)]
async fn reader_that_falls_behind_still_sees_the_exit() {
    let mut side = connected_initiator(ControllerConfig {
        max_duration: Duration::from_secs(300),
        ..config()
    })
    .await;

    // Ticks overflow the queue while nobody reads.
    tokio::time::sleep(Duration::from_secs(320)).await;

    let events = side.collect_until(is_exited).await;
    assert!(events.contains(&CallEvent::TerminalReason(TerminalReason::TimedOut)));
    assert!(matches!(
        events.last(),
        Some(CallEvent::Exited {
            reason: Some(TerminalReason::TimedOut),
            ..
        })
    ));
    let ticks = events
        .iter()
        .filter(|e| matches!(e, CallEvent::Tick { .. }))
        .count();
    assert!(ticks < 300);
    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 1);
    assert_eq!(side.devices.active(), 0);
}

// ---------------------------------------------------------------------------
// Terminal reasons
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn remote_call_ended_waits_grace_without_republishing() {
    let mut side = connected_initiator(config()).await;

    side.inject(SignalMessage::CallEnded {
        match_id: MatchId::from("m1"),
    });
    side.wait_for(|e| matches!(e, CallEvent::TerminalReason(TerminalReason::PartnerEnded)))
        .await;
    let shown_at = Instant::now();

    // Later terminal signals during the window lose.
    side.inject(SignalMessage::PartnerLeft { match_id: None });
    side.controller.match_timeout().await;

    let events = side.collect_until(is_exited).await;
    assert!(Instant::now() - shown_at >= Duration::from_secs(2));
    assert!(!events
        .iter()
        .any(|e| matches!(e, CallEvent::TerminalReason(_))));
    assert_eq!(
        events.last(),
        Some(&CallEvent::Exited {
            match_id: MatchId::from("m1"),
            reason: Some(TerminalReason::PartnerEnded),
        })
    );

    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 0);
    assert_eq!(side.devices.active(), 0);
    assert!(side.endpoints.record(0).unwrap().closed);
    side.settle().await;
    assert_eq!(
        side.controller.status().await.terminal_reason,
        Some(TerminalReason::PartnerEnded)
    );
}

#[tokio::test(start_paused = true)]
async fn grace_window_keeps_session_until_it_elapses() {
    let mut side = connected_initiator(config()).await;

    side.controller.partner_left().await;
    side.wait_for(|e| matches!(e, CallEvent::TerminalReason(TerminalReason::PartnerLeft)))
        .await;
    side.settle().await;

    let status = side.controller.status().await;
    assert_eq!(status.state, Some(SessionState::Connected));
    assert_eq!(status.terminal_reason, Some(TerminalReason::PartnerLeft));
    assert_eq!(side.devices.active(), 1);

    side.wait_for(is_exited).await;
    assert_eq!(side.devices.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn hangup_notifies_partner_once_and_exits_immediately() {
    let mut side = connected_initiator(config()).await;
    let started = Instant::now();

    side.controller.hangup().await;
    side.controller.hangup().await;
    let exited = side.wait_for(is_exited).await;
    assert!(Instant::now() - started < Duration::from_secs(1));
    assert_eq!(
        exited,
        CallEvent::Exited {
            match_id: MatchId::from("m1"),
            reason: Some(TerminalReason::Hangup),
        }
    );

    // Partner's own call-ended arriving afterwards changes nothing.
    side.inject(SignalMessage::CallEnded {
        match_id: MatchId::from("m1"),
    });
    side.settle().await;
    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 1);
    assert!(side.events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn hangup_during_grace_window_is_ignored() {
    let mut side = connected_initiator(config()).await;
    side.inject(SignalMessage::CallEnded {
        match_id: MatchId::from("m1"),
    });
    side.wait_for(|e| matches!(e, CallEvent::TerminalReason(_))).await;

    side.controller.hangup().await;
    side.wait_for(is_exited).await;
    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 0);
}

#[tokio::test(start_paused = true)]
async fn call_ended_for_other_match_is_ignored() {
    let mut side = connected_initiator(config()).await;
    side.inject(SignalMessage::CallEnded {
        match_id: MatchId::from("m0"),
    });
    side.settle().await;
    assert_eq!(side.controller.status().await.terminal_reason, None);
}

// ---------------------------------------------------------------------------
// Rebinding
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rebinding_disposes_previous_session_first() {
    let mut side = Side::standalone(config());
    side.bind("m1", Role::Initiator).await;
    side.settle().await;
    assert_eq!(side.devices.active(), 1);

    side.controller.bind(MatchId::from("m2"), Role::Initiator).await;
    let events = side
        .collect_until(|e| matches!(e, CallEvent::Bound { .. }))
        .await;
    assert!(events.contains(&CallEvent::Exited {
        match_id: MatchId::from("m1"),
        reason: None,
    }));
    side.settle().await;

    assert!(side.endpoints.record(0).unwrap().closed);
    assert_eq!(side.endpoints.created(), 2);
    assert_eq!(side.devices.opened(), 2);
    assert_eq!(side.devices.max_active(), 1);
    assert_eq!(side.signaling.published_count(SignalKind::CallEnded), 0);

    // Late traffic for the old match never reaches the new session.
    side.inject(candidate("m1", 1));
    side.inject(answer("m2"));
    side.inject(candidate("m2", 2));
    side.wait_for(is_connected).await;
    side.settle().await;

    let applied = side.endpoints.record(1).unwrap().applied_candidates;
    assert_eq!(applied.len(), 1);
    assert!(applied[0].candidate.starts_with("candidate:2 "));
    assert!(side.endpoints.record(0).unwrap().applied_candidates.is_empty());
    assert_eq!(
        side.controller.status().await.match_id,
        Some(MatchId::from("m2"))
    );
}

#[tokio::test(start_paused = true)]
async fn rebinding_responder_mid_negotiation() {
    let mut side = Side::standalone(config());
    side.bind("m1", Role::Responder).await;
    side.inject(candidate("m1", 1));
    side.inject(offer("m1"));
    side.wait_for(|e| matches!(e, CallEvent::MicReady)).await;

    side.bind("m2", Role::Responder).await;
    side.settle().await;
    assert_eq!(side.devices.active(), 0);
    assert_eq!(side.devices.max_active(), 1);

    side.inject(offer("m2"));
    side.wait_for(is_connected).await;
    assert_eq!(side.devices.max_active(), 1);
    assert!(side
        .endpoints
        .record(1)
        .unwrap()
        .applied_candidates
        .is_empty());
}

// ---------------------------------------------------------------------------
// Mute and speaking
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn mute_is_announced_to_partner() {
    let mut side = connected_initiator(config()).await;

    side.controller.toggle_mute().await;
    assert_eq!(
        side.wait_for(|e| matches!(e, CallEvent::MuteChanged(_))).await,
        CallEvent::MuteChanged(true)
    );
    side.controller.toggle_mute().await;
    assert_eq!(
        side.wait_for(|e| matches!(e, CallEvent::MuteChanged(_))).await,
        CallEvent::MuteChanged(false)
    );

    assert_eq!(side.signaling.published_count(SignalKind::PartnerMuted), 1);
    assert_eq!(side.signaling.published_count(SignalKind::PartnerUnmuted), 1);
}

#[tokio::test(start_paused = true)]
async fn mute_stays_local_when_announcements_are_off() {
    let mut side = connected_initiator(ControllerConfig {
        announce_mute: false,
        ..config()
    })
    .await;
    side.controller.toggle_mute().await;
    side.wait_for(|e| matches!(e, CallEvent::MuteChanged(true))).await;
    assert_eq!(side.signaling.published_count(SignalKind::PartnerMuted), 0);
    assert!(side.controller.status().await.muted);
}

#[tokio::test(start_paused = true)]
async fn partner_mute_updates_status() {
    let mut side = connected_initiator(config()).await;
    side.inject(SignalMessage::PartnerMuted {
        match_id: MatchId::from("m1"),
    });
    side.wait_for(|e| matches!(e, CallEvent::PartnerMuteChanged(true)))
        .await;
    side.settle().await;
    assert!(side.controller.status().await.partner_muted);

    side.inject(SignalMessage::PartnerUnmuted {
        match_id: MatchId::from("m1"),
    });
    side.wait_for(|e| matches!(e, CallEvent::PartnerMuteChanged(false)))
        .await;
}

#[tokio::test(start_paused = true)]
async fn speaking_follows_synthetic_voice() {
    let mut side = Side::spawn_with(
        config(),
        MemorySignalingChannel::standalone(),
        LoopbackDevices::new().with_synthetic_voice(),
    );
    side.bind("m1", Role::Initiator).await;

    side.wait_for(|e| matches!(e, CallEvent::SpeakingChanged(true)))
        .await;
    side.wait_for(|e| matches!(e, CallEvent::SpeakingChanged(false)))
        .await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_hangs_up_active_call() {
    let side = connected_initiator(config()).await;
    let signaling = side.signaling.clone();
    let devices = side.devices.clone();

    side.controller.shutdown().await;
    assert_eq!(signaling.published_count(SignalKind::CallEnded), 1);
    assert_eq!(devices.active(), 0);
}
