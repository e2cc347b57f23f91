//! The per-match negotiation session.

use std::collections::VecDeque;
use std::sync::Arc;

use duet_common::MatchId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::{MicrophoneStatus, SessionState, SignalOutcome};
use crate::endpoint::{EndpointEvent, EndpointFactory, IceServer, NegotiationEndpoint, SignalingState};
use crate::error::CallError;
use crate::media::{AudioConstraints, AudioDevices, LocalAudioStream, LocalAudioTrack, RemoteAudio};
use crate::protocol::{IceCandidate, Role, SessionDescription, SignalMessage};
use crate::signaling::SignalingChannel;

/// Inputs a session needs beyond its collaborators.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub constraints: AudioConstraints,
    pub ice_servers: Vec<IceServer>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Owns the negotiation endpoint and the microphone capture for one match.
///
/// Negotiation failures never escape: they are logged, counted, and reported
/// as a [`SignalOutcome`]. Only the state change to `Connected` or `Ended`
/// matters to the owner.
pub struct PeerConnectionSession {
    match_id: MatchId,
    role: Role,
    state: SessionState,
    settings: SessionSettings,

    signaling: Arc<dyn SignalingChannel>,
    devices: Arc<dyn AudioDevices>,
    endpoints: Arc<dyn EndpointFactory>,

    endpoint: Option<Box<dyn NegotiationEndpoint>>,
    endpoint_tx: mpsc::UnboundedSender<EndpointEvent>,

    local_audio: Option<LocalAudioStream>,
    remote_audio: Option<RemoteAudio>,
    microphone: MicrophoneStatus,
    muted: bool,

    pending_candidates: VecDeque<IceCandidate>,
    remote_description_set: bool,
    rejected_signals: usize,
}

impl PeerConnectionSession {
    /// Create an idle session. The receiver carries what the endpoint
    /// discovers on its own and must be fed back through
    /// [`handle_endpoint_event`](Self::handle_endpoint_event).
    pub fn new(
        match_id: MatchId,
        role: Role,
        signaling: Arc<dyn SignalingChannel>,
        devices: Arc<dyn AudioDevices>,
        endpoints: Arc<dyn EndpointFactory>,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<EndpointEvent>) {
        let (endpoint_tx, endpoint_rx) = mpsc::unbounded_channel();
        let session = Self {
            match_id,
            role,
            state: SessionState::Idle,
            settings,
            signaling,
            devices,
            endpoints,
            endpoint: None,
            endpoint_tx,
            local_audio: None,
            remote_audio: None,
            microphone: MicrophoneStatus::Pending,
            muted: false,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            rejected_signals: 0,
        };
        (session, endpoint_rx)
    }

    // ----- Accessors -----

    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn microphone(&self) -> &MicrophoneStatus {
        &self.microphone
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn local_track(&self) -> Option<&LocalAudioTrack> {
        self.local_audio.as_ref().and_then(|s| s.audio_track())
    }

    pub fn remote_audio(&self) -> Option<&RemoteAudio> {
        self.remote_audio.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    /// Offers and answers discarded because the endpoint could not take them.
    pub fn rejected_signals(&self) -> usize {
        self.rejected_signals
    }

    // ----- Local media -----

    /// Open the microphone if not already held. Returns whether a capture is
    /// held afterwards; failure leaves the session usable receive-only.
    pub async fn acquire_local_audio(&mut self) -> bool {
        if self.local_audio.is_some() {
            return true;
        }
        if self.state.is_ended() {
            return false;
        }

        match self.devices.open_microphone(self.settings.constraints).await {
            Ok(stream) => {
                info!(match_id = %self.match_id, stream = %stream.id, "Microphone acquired");
                if let Some(endpoint) = self.endpoint.as_mut() {
                    attach_tracks(&mut **endpoint, &stream).await;
                }
                self.local_audio = Some(stream);
                self.microphone = MicrophoneStatus::Ready;
                true
            }
            Err(e) => {
                warn!(match_id = %self.match_id, error = %e, "Microphone unavailable, continuing receive-only");
                self.microphone = MicrophoneStatus::Unavailable(e.to_string());
                false
            }
        }
    }

    /// Flip the local track's enabled flag. `None` when there is no track.
    pub fn toggle_mute(&mut self) -> Option<bool> {
        let track = self.local_audio.as_ref()?.audio_track()?;
        self.muted = !self.muted;
        track.set_enabled(!self.muted);
        debug!(match_id = %self.match_id, muted = self.muted, "Mute toggled");
        Some(self.muted)
    }

    // ----- Negotiation -----

    /// Begin negotiation by publishing an offer. Only the initiator may do
    /// this, and only once; every other call returns `false`.
    pub async fn start_as_initiator(&mut self) -> bool {
        if self.role != Role::Initiator {
            debug!(match_id = %self.match_id, "Responder cannot start negotiation");
            return false;
        }
        if !self.transition(SessionState::Negotiating) {
            return false;
        }

        self.acquire_local_audio().await;
        if let Err(e) = self.send_offer().await {
            warn!(match_id = %self.match_id, error = %e, "Failed to create offer");
        }
        true
    }

    async fn send_offer(&mut self) -> Result<(), CallError> {
        let endpoint = self.ensure_endpoint().await?;
        let offer = endpoint.create_offer().await?;
        endpoint.set_local_description(offer.clone()).await?;
        self.publish(SignalMessage::Offer {
            match_id: self.match_id.clone(),
            sdp: offer.sdp,
        })
        .await;
        info!(match_id = %self.match_id, "Offer published");
        Ok(())
    }

    /// Route an incoming message to the matching handler.
    pub async fn handle_signal(&mut self, message: SignalMessage) -> SignalOutcome {
        if let Some(received) = message.match_id() {
            if *received != self.match_id {
                debug!(
                    bound = %self.match_id,
                    received = %received,
                    event = message.event_name(),
                    "Discarding stale signal"
                );
                return SignalOutcome::Dropped(CallError::StaleMessage {
                    expected: self.match_id.clone(),
                    received: received.clone(),
                });
            }
        }
        if self.state.is_ended() {
            return SignalOutcome::Ignored;
        }

        match message {
            SignalMessage::Offer { sdp, .. } => {
                self.handle_remote_offer(SessionDescription::offer(sdp)).await
            }
            SignalMessage::Answer { sdp, .. } => {
                self.handle_remote_answer(SessionDescription::answer(sdp)).await
            }
            SignalMessage::IceCandidate { candidate, .. } => {
                self.handle_remote_candidate(candidate).await
            }
            _ => SignalOutcome::Ignored,
        }
    }

    /// Answer the partner's offer. Responder only.
    pub async fn handle_remote_offer(&mut self, offer: SessionDescription) -> SignalOutcome {
        if self.state.is_ended() {
            return SignalOutcome::Ignored;
        }
        if self.role == Role::Initiator {
            return self.reject("offer received by the initiator");
        }
        let stable = self
            .endpoint
            .as_ref()
            .map_or(true, |ep| ep.signaling_state() == SignalingState::Stable);
        if self.remote_description_set || !stable {
            return self.reject("offer received after negotiation");
        }

        if self.state == SessionState::Idle {
            self.transition(SessionState::Negotiating);
        }
        self.acquire_local_audio().await;

        match self.accept_offer(offer).await {
            Ok(()) => SignalOutcome::Applied,
            Err(e) => {
                warn!(match_id = %self.match_id, error = %e, "Failed to answer offer");
                SignalOutcome::Dropped(e)
            }
        }
    }

    async fn accept_offer(&mut self, offer: SessionDescription) -> Result<(), CallError> {
        self.ensure_endpoint().await?.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.drain_pending_candidates().await;

        let endpoint = self.ensure_endpoint().await?;
        let answer = endpoint.create_answer().await?;
        endpoint.set_local_description(answer.clone()).await?;
        self.publish(SignalMessage::Answer {
            match_id: self.match_id.clone(),
            sdp: answer.sdp,
        })
        .await;
        info!(match_id = %self.match_id, "Answer published");
        Ok(())
    }

    /// Apply the partner's answer to our outstanding offer. Initiator only.
    pub async fn handle_remote_answer(&mut self, answer: SessionDescription) -> SignalOutcome {
        if self.state.is_ended() {
            return SignalOutcome::Ignored;
        }
        if self.role != Role::Initiator {
            return self.reject("answer received by the responder");
        }
        let Some(endpoint) = self.endpoint.as_mut() else {
            return self.reject("answer received before an offer was sent");
        };
        if endpoint.signaling_state() != SignalingState::HaveLocalOffer {
            let state = endpoint.signaling_state();
            return self.reject(&format!("answer received in state {state:?}"));
        }

        if let Err(e) = endpoint.set_remote_description(answer).await {
            warn!(match_id = %self.match_id, error = %e, "Failed to apply answer");
            return SignalOutcome::Dropped(e);
        }
        self.remote_description_set = true;
        debug!(match_id = %self.match_id, "Answer applied");
        self.drain_pending_candidates().await;
        SignalOutcome::Applied
    }

    /// Apply a remote candidate now, or hold it until the remote description
    /// is set.
    pub async fn handle_remote_candidate(&mut self, candidate: IceCandidate) -> SignalOutcome {
        if self.state.is_ended() {
            return SignalOutcome::Ignored;
        }
        let endpoint = match self.endpoint.as_mut() {
            Some(endpoint) if self.remote_description_set => endpoint,
            _ => {
                self.pending_candidates.push_back(candidate);
                debug!(
                    match_id = %self.match_id,
                    queued = self.pending_candidates.len(),
                    "Candidate queued"
                );
                return SignalOutcome::Queued;
            }
        };
        match endpoint.add_ice_candidate(candidate).await {
            Ok(()) => SignalOutcome::Applied,
            Err(e) => {
                debug!(match_id = %self.match_id, error = %e, "Candidate rejected");
                SignalOutcome::Dropped(e)
            }
        }
    }

    async fn drain_pending_candidates(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        let count = self.pending_candidates.len();
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = endpoint.add_ice_candidate(candidate).await {
                warn!(match_id = %self.match_id, error = %e, "Queued candidate rejected");
            }
        }
        if count > 0 {
            debug!(match_id = %self.match_id, count, "Queued candidates applied");
        }
    }

    // ----- Endpoint callbacks -----

    /// Feed back something the endpoint reported. Returns `true` when this
    /// made the session `Connected`.
    pub async fn handle_endpoint_event(&mut self, event: EndpointEvent) -> bool {
        match event {
            EndpointEvent::LocalCandidate(candidate) => {
                self.on_local_candidate(candidate).await;
                false
            }
            EndpointEvent::RemoteTrack(remote) => self.on_remote_track(remote),
        }
    }

    /// Publish a locally discovered candidate right away.
    pub async fn on_local_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_ended() {
            return;
        }
        self.publish(SignalMessage::IceCandidate {
            match_id: self.match_id.clone(),
            candidate,
        })
        .await;
    }

    pub fn on_remote_track(&mut self, remote: RemoteAudio) -> bool {
        if self.state.is_ended() {
            return false;
        }
        info!(match_id = %self.match_id, track = %remote.track_id, "Remote audio attached");
        self.remote_audio = Some(remote);
        self.transition(SessionState::Connected)
    }

    // ----- Teardown -----

    /// Release everything the session holds. Only the first call has any
    /// effect; it returns `true`. With `notify_peer` set, the partner is told
    /// with a single `call-ended`.
    pub async fn end(&mut self, notify_peer: bool) -> bool {
        if !self.transition(SessionState::Ended) {
            return false;
        }

        if let Some(mut endpoint) = self.endpoint.take() {
            endpoint.close().await;
        }
        if let Some(stream) = self.local_audio.take() {
            stream.stop_all();
        }
        self.remote_audio = None;
        self.pending_candidates.clear();
        self.remote_description_set = false;
        self.muted = false;

        if notify_peer {
            self.publish(SignalMessage::CallEnded {
                match_id: self.match_id.clone(),
            })
            .await;
        }
        info!(match_id = %self.match_id, notify_peer, "Session ended");
        true
    }

    // ----- Helpers -----

    fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(match_id = %self.match_id, from = %self.state, to = %next, "Transition refused");
            return false;
        }
        info!(match_id = %self.match_id, from = %self.state, to = %next, "Session state changed");
        self.state = next;
        true
    }

    fn reject(&mut self, reason: &str) -> SignalOutcome {
        warn!(match_id = %self.match_id, reason, "Signal rejected");
        self.rejected_signals += 1;
        SignalOutcome::Dropped(CallError::SignalingRejected(reason.to_string()))
    }

    async fn ensure_endpoint(&mut self) -> Result<&mut Box<dyn NegotiationEndpoint>, CallError> {
        if self.endpoint.is_none() {
            let mut endpoint = self
                .endpoints
                .create(&self.settings.ice_servers, self.endpoint_tx.clone())?;
            if let Some(stream) = &self.local_audio {
                attach_tracks(&mut *endpoint, stream).await;
            }
            self.endpoint = Some(endpoint);
        }
        match self.endpoint.as_mut() {
            Some(endpoint) => Ok(endpoint),
            None => Err(CallError::Negotiation("endpoint unavailable".into())),
        }
    }

    async fn publish(&self, message: SignalMessage) {
        let event = message.event_name();
        if let Err(e) = self.signaling.publish(message).await {
            warn!(match_id = %self.match_id, event, error = %e, "Failed to publish signal");
        }
    }
}

async fn attach_tracks(endpoint: &mut dyn NegotiationEndpoint, stream: &LocalAudioStream) {
    for track in stream.tracks() {
        if let Err(e) = endpoint.add_track(track).await {
            warn!(track = track.id(), error = %e, "Failed to attach local track");
        }
    }
}

impl std::fmt::Debug for PeerConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnectionSession")
            .field("match_id", &self.match_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("microphone", &self.microphone)
            .field("muted", &self.muted)
            .field("pending_candidates", &self.pending_candidates.len())
            .finish()
    }
}
