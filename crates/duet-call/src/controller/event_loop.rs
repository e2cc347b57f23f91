//! The controller task.

use std::future::pending;
use std::sync::Arc;

use duet_common::MatchId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use super::types::{CallEvent, CallStatus, ControllerCommand, ControllerConfig, TerminalReason};
use crate::endpoint::{EndpointEvent, EndpointFactory};
use crate::media::AudioDevices;
use crate::protocol::{Role, SignalMessage};
use crate::session::{MicrophoneStatus, PeerConnectionSession, SessionState};
use crate::signaling::{SignalingChannel, Subscription};
use crate::timer::{is_ending_soon, MatchSessionTimer, TimerTick};
use crate::vad::VoiceActivityMonitor;

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Everything tied to the currently bound match. Replaced wholesale when the
/// match changes.
struct Binding {
    session: PeerConnectionSession,
    endpoint_rx: mpsc::UnboundedReceiver<EndpointEvent>,
    subscription: Option<Subscription>,
    timer: MatchSessionTimer,
    vad: Option<VoiceActivityMonitor>,
    auto_started: bool,
    terminal: Option<TerminalReason>,
    exit_deadline: Option<Instant>,
    exited: bool,
    microphone: MicrophoneStatus,
    partner_muted: bool,
    speaking: bool,
    remaining_secs: u32,
}

impl Binding {
    fn match_id(&self) -> &MatchId {
        self.session.match_id()
    }
}

enum Step {
    Command(Option<ControllerCommand>),
    Signal(Option<SignalMessage>),
    Endpoint(Option<EndpointEvent>),
    Tick(TimerTick),
    Speaking(Option<bool>),
    GraceElapsed,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

pub(crate) struct ControllerLoop {
    config: ControllerConfig,
    signaling: Arc<dyn SignalingChannel>,
    devices: Arc<dyn AudioDevices>,
    endpoints: Arc<dyn EndpointFactory>,
    status: Arc<RwLock<CallStatus>>,
    event_tx: mpsc::Sender<CallEvent>,
    audio_enabled: bool,
    binding: Option<Binding>,
}

impl ControllerLoop {
    pub(crate) fn new(
        config: ControllerConfig,
        signaling: Arc<dyn SignalingChannel>,
        devices: Arc<dyn AudioDevices>,
        endpoints: Arc<dyn EndpointFactory>,
        status: Arc<RwLock<CallStatus>>,
        event_tx: mpsc::Sender<CallEvent>,
    ) -> Self {
        let audio_enabled = config.audio_mode;
        Self {
            config,
            signaling,
            devices,
            endpoints,
            status,
            event_tx,
            audio_enabled,
            binding: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<ControllerCommand>) {
        loop {
            let step = match self.binding.as_mut() {
                Some(b) if !b.exited => {
                    let deadline = b.exit_deadline;
                    tokio::select! {
                        cmd = commands.recv() => Step::Command(cmd),
                        msg = next_signal(&mut b.subscription) => Step::Signal(msg),
                        event = b.endpoint_rx.recv() => Step::Endpoint(event),
                        tick = b.timer.tick() => Step::Tick(tick),
                        speaking = next_speaking(&mut b.vad) => Step::Speaking(speaking),
                        _ = wait_until(deadline) => Step::GraceElapsed,
                    }
                }
                _ => Step::Command(commands.recv().await),
            };

            match step {
                Step::Command(None) | Step::Command(Some(ControllerCommand::Shutdown)) => {
                    self.hangup().await;
                    self.finish(false).await;
                    self.publish_status().await;
                    info!("Call controller stopped");
                    return;
                }
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Signal(Some(message)) => self.handle_signal(message).await,
                Step::Signal(None) => {
                    warn!("Signaling subscription closed");
                    if let Some(b) = self.binding.as_mut() {
                        b.subscription = None;
                    }
                }
                Step::Endpoint(Some(event)) => self.handle_endpoint_event(event).await,
                Step::Endpoint(None) => {}
                Step::Tick(tick) => self.handle_tick(tick).await,
                Step::Speaking(Some(speaking)) => self.handle_speaking(speaking),
                Step::Speaking(None) => {
                    if let Some(b) = self.binding.as_mut() {
                        b.vad = None;
                    }
                }
                Step::GraceElapsed => self.finish(false).await,
            }

            self.publish_status().await;
        }
    }

    // ----- Commands -----

    async fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Bind { match_id, role } => self.bind(match_id, role).await,
            ControllerCommand::SetAudioEnabled(enabled) => {
                self.audio_enabled = enabled;
                debug!(enabled, "Audio mode changed");
                self.maybe_auto_start().await;
            }
            ControllerCommand::ToggleMute => self.toggle_mute().await,
            ControllerCommand::Hangup => self.hangup().await,
            ControllerCommand::PartnerLeft => self.begin_terminal(TerminalReason::PartnerLeft).await,
            ControllerCommand::MatchTimeout => self.begin_terminal(TerminalReason::TimedOut).await,
            ControllerCommand::Shutdown => {}
        }
    }

    async fn bind(&mut self, match_id: MatchId, role: Role) {
        if let Some(b) = &self.binding {
            if *b.match_id() == match_id {
                debug!(match_id = %match_id, "Already bound, ignoring duplicate bind");
                return;
            }
            info!(from = %b.match_id(), to = %match_id, "Match changed, disposing session");
            // The old capture must be released before the new session can
            // open the microphone.
            self.finish(false).await;
        }

        // Subscribe before anything is published so no reply can be missed.
        let subscription = self.signaling.subscribe(&[]);
        let (session, endpoint_rx) = PeerConnectionSession::new(
            match_id.clone(),
            role,
            Arc::clone(&self.signaling),
            Arc::clone(&self.devices),
            Arc::clone(&self.endpoints),
            self.config.session.clone(),
        );
        let timer = MatchSessionTimer::new(self.config.max_duration);
        let remaining_secs = timer.total();

        self.binding = Some(Binding {
            session,
            endpoint_rx,
            subscription: Some(subscription),
            timer,
            vad: None,
            auto_started: false,
            terminal: None,
            exit_deadline: None,
            exited: false,
            microphone: MicrophoneStatus::Pending,
            partner_muted: false,
            speaking: false,
            remaining_secs,
        });
        info!(match_id = %match_id, role = %role, "Match bound");
        self.emit(CallEvent::Bound { match_id, role }).await;

        self.maybe_auto_start().await;
    }

    async fn maybe_auto_start(&mut self) {
        if !self.audio_enabled {
            return;
        }
        let Some(b) = self.active_binding() else {
            return;
        };
        if b.session.role() != Role::Initiator || b.auto_started || b.terminal.is_some() {
            return;
        }
        b.auto_started = true;
        b.session.start_as_initiator().await;
        self.sync_microphone().await;
    }

    async fn toggle_mute(&mut self) {
        let announce = self.config.announce_mute;
        let Some(b) = self.active_binding() else {
            return;
        };
        let Some(muted) = b.session.toggle_mute() else {
            debug!("No local track to mute");
            return;
        };
        let match_id = b.match_id().clone();
        self.emit(CallEvent::MuteChanged(muted)).await;

        if announce {
            let message = if muted {
                SignalMessage::PartnerMuted { match_id }
            } else {
                SignalMessage::PartnerUnmuted { match_id }
            };
            if let Err(e) = self.signaling.publish(message).await {
                warn!(error = %e, "Failed to announce mute state");
            }
        }
    }

    /// End locally and notify the partner. No grace window: we asked for it.
    async fn hangup(&mut self) {
        let Some(b) = self.active_binding() else {
            return;
        };
        if b.terminal.is_some() {
            debug!("Call already ending, hangup ignored");
            return;
        }
        b.terminal = Some(TerminalReason::Hangup);
        info!(match_id = %b.match_id(), "Hanging up");
        self.emit(CallEvent::TerminalReason(TerminalReason::Hangup)).await;
        self.finish(true).await;
    }

    // ----- Signaling -----

    async fn handle_signal(&mut self, message: SignalMessage) {
        let Some(b) = self.active_binding() else {
            return;
        };
        if !message.is_for(b.match_id()) {
            debug!(
                bound = %b.match_id(),
                event = message.event_name(),
                "Discarding signal for another match"
            );
            return;
        }

        match message {
            SignalMessage::CallEnded { .. } => {
                self.begin_terminal(TerminalReason::PartnerEnded).await
            }
            SignalMessage::PartnerLeft { .. } => {
                self.begin_terminal(TerminalReason::PartnerLeft).await
            }
            SignalMessage::MatchTimeout { .. } => {
                self.begin_terminal(TerminalReason::TimedOut).await
            }
            SignalMessage::PartnerMuted { .. } => self.set_partner_muted(true).await,
            SignalMessage::PartnerUnmuted { .. } => self.set_partner_muted(false).await,
            negotiation => {
                let outcome = b.session.handle_signal(negotiation).await;
                trace!(?outcome, "Signal handled");
                self.sync_microphone().await;
            }
        }
    }

    async fn set_partner_muted(&mut self, muted: bool) {
        let Some(b) = self.active_binding() else {
            return;
        };
        if b.partner_muted != muted {
            b.partner_muted = muted;
            self.emit(CallEvent::PartnerMuteChanged(muted)).await;
        }
    }

    async fn handle_endpoint_event(&mut self, event: EndpointEvent) {
        let Some(b) = self.active_binding() else {
            return;
        };
        if !b.session.handle_endpoint_event(event).await {
            return;
        }
        if b.terminal.is_none() && b.timer.start() {
            debug!(secs = b.timer.total(), "Call timer started");
        }
        self.emit(CallEvent::Connected).await;
    }

    // ----- Timer and speaking -----

    async fn handle_tick(&mut self, tick: TimerTick) {
        let ending_soon_secs = self.config.ending_soon_secs;
        let Some(b) = self.active_binding() else {
            return;
        };
        match tick {
            TimerTick::Remaining(secs) => {
                b.remaining_secs = secs;
                if secs == ending_soon_secs {
                    info!(match_id = %b.match_id(), secs, "Call ending soon");
                }
                self.emit_lossy(CallEvent::Tick { remaining_secs: secs });
            }
            TimerTick::Expired => {
                b.remaining_secs = 0;
                info!(match_id = %b.match_id(), "Call time limit reached");
                self.emit_lossy(CallEvent::Tick { remaining_secs: 0 });
                self.begin_terminal(TerminalReason::TimedOut).await;
                if let Some(b) = self.active_binding() {
                    b.session.end(true).await;
                }
            }
        }
    }

    fn handle_speaking(&mut self, speaking: bool) {
        let Some(b) = self.active_binding() else {
            return;
        };
        if b.speaking != speaking {
            b.speaking = speaking;
            self.emit_lossy(CallEvent::SpeakingChanged(speaking));
        }
    }

    // ----- Teardown -----

    /// Show `reason` and schedule teardown after the grace window. Only the
    /// first reason counts.
    async fn begin_terminal(&mut self, reason: TerminalReason) {
        let grace = self.config.exit_grace;
        let Some(b) = self.active_binding() else {
            return;
        };
        if let Some(current) = b.terminal {
            debug!(?current, ignored = ?reason, "Terminal reason already set");
            return;
        }
        b.terminal = Some(reason);
        b.timer.cancel();
        b.exit_deadline = Some(Instant::now() + grace);
        info!(match_id = %b.match_id(), ?reason, "Call ending");
        self.emit(CallEvent::TerminalReason(reason)).await;
    }

    /// Tear the bound session down. Safe to call repeatedly.
    async fn finish(&mut self, notify_peer: bool) {
        let Some(b) = self.active_binding() else {
            return;
        };
        b.session.end(notify_peer).await;
        b.timer.cancel();
        b.vad = None;
        b.subscription = None;
        b.exit_deadline = None;
        b.speaking = false;
        b.exited = true;
        while b.endpoint_rx.try_recv().is_ok() {}

        let match_id = b.match_id().clone();
        let reason = b.terminal;
        info!(match_id = %match_id, ?reason, "Session disposed");
        self.emit(CallEvent::Exited { match_id, reason }).await;
    }

    // ----- Helpers -----

    fn active_binding(&mut self) -> Option<&mut Binding> {
        self.binding.as_mut().filter(|b| !b.exited)
    }

    /// Report microphone changes and start speaking detection once a track
    /// is available.
    async fn sync_microphone(&mut self) {
        let vad_config = self.config.vad;
        let Some(b) = self.active_binding() else {
            return;
        };
        let current = b.session.microphone().clone();
        if current == b.microphone {
            return;
        }
        b.microphone = current.clone();

        if b.vad.is_none() {
            if let Some(track) = b.session.local_track() {
                b.vad = VoiceActivityMonitor::spawn(track, vad_config);
            }
        }

        match current {
            MicrophoneStatus::Ready => self.emit(CallEvent::MicReady).await,
            MicrophoneStatus::Unavailable(reason) => {
                self.emit(CallEvent::MicrophoneUnavailable(reason)).await
            }
            MicrophoneStatus::Pending => {}
        }
    }

    /// Deliver a lifecycle event. Waits for room in the queue so a slow
    /// reader still sees every state change.
    async fn emit(&self, event: CallEvent) {
        if self.event_tx.send(event).await.is_err() {
            trace!("Event receiver dropped");
        }
    }

    /// Deliver a high-frequency event, dropping it when the queue is full.
    fn emit_lossy(&self, event: CallEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!(?event, "Event queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn publish_status(&self) {
        let ending_soon_secs = self.config.ending_soon_secs;
        let mut status = self.status.write().await;
        let Some(b) = &self.binding else {
            *status = CallStatus::default();
            return;
        };
        let session = &b.session;
        *status = CallStatus {
            match_id: Some(session.match_id().clone()),
            role: Some(session.role()),
            state: Some(session.state()),
            mic_ready: session.microphone().is_ready(),
            mic_error: match session.microphone() {
                MicrophoneStatus::Unavailable(reason) => Some(reason.clone()),
                _ => None,
            },
            muted: session.is_muted(),
            partner_muted: b.partner_muted,
            speaking: b.speaking,
            remote_audio: session.remote_audio().is_some(),
            remaining_secs: b.remaining_secs,
            ending_soon: session.state() == SessionState::Connected
                && is_ending_soon(b.remaining_secs, ending_soon_secs),
            terminal_reason: b.terminal,
        };
    }
}

async fn next_signal(subscription: &mut Option<Subscription>) -> Option<SignalMessage> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => pending().await,
    }
}

async fn next_speaking(vad: &mut Option<VoiceActivityMonitor>) -> Option<bool> {
    match vad {
        Some(monitor) => monitor.changed().await,
        None => pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
