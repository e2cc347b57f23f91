use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::endpoint::{
    EndpointEvent, EndpointFactory, IceServer, NegotiationEndpoint, SignalingState,
};
use crate::error::CallError;
use crate::media::{LocalAudioTrack, RemoteAudio};
use crate::protocol::{IceCandidate, SdpType, SessionDescription};

/// Everything one loopback endpoint was asked to do.
#[derive(Debug, Clone, Default)]
pub struct EndpointRecord {
    pub id: usize,
    pub ice_servers: Vec<IceServer>,
    pub tracks: Vec<String>,
    pub local_descriptions: Vec<SessionDescription>,
    pub remote_descriptions: Vec<SessionDescription>,
    pub applied_candidates: Vec<IceCandidate>,
    pub closed: bool,
}

struct FactoryInner {
    candidates_per_description: usize,
    next_id: AtomicUsize,
    records: Mutex<Vec<EndpointRecord>>,
}

impl FactoryInner {
    fn records(&self) -> MutexGuard<'_, Vec<EndpointRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, id: usize, f: impl FnOnce(&mut EndpointRecord)) {
        if let Some(record) = self.records().get_mut(id) {
            f(record);
        }
    }
}

/// Creates endpoints that negotiate with nobody but follow the offer/answer
/// state machine and report candidates and a remote track as a real
/// connection would.
#[derive(Clone)]
pub struct LoopbackEndpointFactory {
    inner: Arc<FactoryInner>,
}

impl LoopbackEndpointFactory {
    pub fn new() -> Self {
        Self::with_candidates(2)
    }

    /// Emit `count` local candidates after every local description.
    pub fn with_candidates(count: usize) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                candidates_per_description: count,
                next_id: AtomicUsize::new(0),
                records: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn created(&self) -> usize {
        self.inner.records().len()
    }

    pub fn records(&self) -> Vec<EndpointRecord> {
        self.inner.records().clone()
    }

    pub fn record(&self, id: usize) -> Option<EndpointRecord> {
        self.inner.records().get(id).cloned()
    }
}

impl Default for LoopbackEndpointFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointFactory for LoopbackEndpointFactory {
    fn create(
        &self,
        ice_servers: &[IceServer],
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Box<dyn NegotiationEndpoint>, CallError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.inner.records().push(EndpointRecord {
            id,
            ice_servers: ice_servers.to_vec(),
            ..Default::default()
        });
        debug!(endpoint = id, servers = ice_servers.len(), "Loopback endpoint created");
        Ok(Box::new(LoopbackEndpoint {
            id,
            state: SignalingState::Stable,
            has_remote_description: false,
            tracks: Vec::new(),
            events,
            shared: Arc::clone(&self.inner),
        }))
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

struct LoopbackEndpoint {
    id: usize,
    state: SignalingState,
    has_remote_description: bool,
    tracks: Vec<String>,
    events: mpsc::UnboundedSender<EndpointEvent>,
    shared: Arc<FactoryInner>,
}

impl LoopbackEndpoint {
    fn expect_state(&self, expected: SignalingState, action: &str) -> Result<(), CallError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CallError::Negotiation(format!(
                "cannot {action} in state {:?}",
                self.state
            )))
        }
    }

    fn sdp(&self, kind: SdpType) -> String {
        let mut sdp = format!(
            "v=0\r\no=loopback {} 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na={}\r\n",
            self.id,
            match kind {
                SdpType::Offer => "setup:actpass",
                SdpType::Answer => "setup:active",
            }
        );
        for track in &self.tracks {
            sdp.push_str(&format!("a=msid:loopback {track}\r\n"));
        }
        if self.tracks.is_empty() {
            sdp.push_str("a=recvonly\r\n");
        }
        sdp
    }

    fn gather_candidates(&self) {
        let count = self.shared.candidates_per_description;
        for i in 0..count {
            let port = 50_000 + self.id * 100 + i;
            let candidate = IceCandidate::new(format!(
                "candidate:{i} 1 udp {} 127.0.0.1 {port} typ host",
                2_122_260_223u32 - i as u32
            ));
            let _ = self.events.send(EndpointEvent::LocalCandidate(candidate));
        }
    }
}

#[async_trait]
impl NegotiationEndpoint for LoopbackEndpoint {
    fn signaling_state(&self) -> SignalingState {
        self.state
    }

    async fn add_track(&mut self, track: &LocalAudioTrack) -> Result<(), CallError> {
        if self.state == SignalingState::Closed {
            return Err(CallError::Negotiation("endpoint closed".into()));
        }
        let id = track.id().to_string();
        self.tracks.push(id.clone());
        self.shared.update(self.id, |r| r.tracks.push(id));
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, CallError> {
        self.expect_state(SignalingState::Stable, "create offer")?;
        Ok(SessionDescription::offer(self.sdp(SdpType::Offer)))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, CallError> {
        self.expect_state(SignalingState::HaveRemoteOffer, "create answer")?;
        Ok(SessionDescription::answer(self.sdp(SdpType::Answer)))
    }

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), CallError> {
        self.state = match desc.kind {
            SdpType::Offer => {
                self.expect_state(SignalingState::Stable, "set local offer")?;
                SignalingState::HaveLocalOffer
            }
            SdpType::Answer => {
                self.expect_state(SignalingState::HaveRemoteOffer, "set local answer")?;
                SignalingState::Stable
            }
        };
        self.shared
            .update(self.id, |r| r.local_descriptions.push(desc));
        self.gather_candidates();
        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        desc: SessionDescription,
    ) -> Result<(), CallError> {
        self.state = match desc.kind {
            SdpType::Offer => {
                self.expect_state(SignalingState::Stable, "set remote offer")?;
                SignalingState::HaveRemoteOffer
            }
            SdpType::Answer => {
                self.expect_state(SignalingState::HaveLocalOffer, "set remote answer")?;
                SignalingState::Stable
            }
        };
        self.has_remote_description = true;
        self.shared
            .update(self.id, |r| r.remote_descriptions.push(desc));
        let _ = self.events.send(EndpointEvent::RemoteTrack(RemoteAudio {
            stream_id: format!("loopback-remote-{}", self.id),
            track_id: format!("loopback-remote-audio-{}", self.id),
        }));
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), CallError> {
        if self.state == SignalingState::Closed {
            return Err(CallError::Negotiation("endpoint closed".into()));
        }
        if !self.has_remote_description {
            return Err(CallError::Negotiation(
                "candidate before remote description".into(),
            ));
        }
        self.shared
            .update(self.id, |r| r.applied_candidates.push(candidate));
        Ok(())
    }

    async fn close(&mut self) {
        self.state = SignalingState::Closed;
        self.shared.update(self.id, |r| r.closed = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(
        factory: &LoopbackEndpointFactory,
    ) -> (Box<dyn NegotiationEndpoint>, mpsc::UnboundedReceiver<EndpointEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (factory.create(&[], tx).unwrap(), rx)
    }

    #[tokio::test]
    async fn offer_answer_round() {
        let factory = LoopbackEndpointFactory::with_candidates(1);
        let (mut caller, mut caller_events) = endpoint(&factory);
        let (mut callee, mut callee_events) = endpoint(&factory);

        caller.add_track(&LocalAudioTrack::new("mic")).await.unwrap();
        let offer = caller.create_offer().await.unwrap();
        assert!(offer.sdp.contains("a=msid:loopback mic"));
        caller.set_local_description(offer.clone()).await.unwrap();
        assert_eq!(caller.signaling_state(), SignalingState::HaveLocalOffer);
        assert!(matches!(
            caller_events.try_recv(),
            Ok(EndpointEvent::LocalCandidate(_))
        ));

        callee.set_remote_description(offer).await.unwrap();
        assert!(matches!(
            callee_events.try_recv(),
            Ok(EndpointEvent::RemoteTrack(_))
        ));
        let answer = callee.create_answer().await.unwrap();
        callee.set_local_description(answer.clone()).await.unwrap();
        assert_eq!(callee.signaling_state(), SignalingState::Stable);

        caller.set_remote_description(answer).await.unwrap();
        assert_eq!(caller.signaling_state(), SignalingState::Stable);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn rejects_out_of_order_descriptions() {
        let factory = LoopbackEndpointFactory::new();
        let (mut ep, _events) = endpoint(&factory);

        assert!(ep.create_answer().await.is_err());
        let err = ep
            .set_remote_description(SessionDescription::answer("v=0"))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Negotiation(_)));
        assert_eq!(ep.signaling_state(), SignalingState::Stable);
    }

    #[tokio::test]
    async fn candidates_need_a_remote_description() {
        let factory = LoopbackEndpointFactory::new();
        let (mut ep, _events) = endpoint(&factory);
        let candidate = IceCandidate::new("candidate:0 1 udp 1 10.0.0.1 1 typ host");

        assert!(ep.add_ice_candidate(candidate.clone()).await.is_err());
        ep.set_remote_description(SessionDescription::offer("v=0"))
            .await
            .unwrap();
        ep.add_ice_candidate(candidate.clone()).await.unwrap();
        assert_eq!(factory.record(0).unwrap().applied_candidates, vec![candidate]);
    }

    #[tokio::test]
    async fn close_is_recorded() {
        let factory = LoopbackEndpointFactory::new();
        let (mut ep, _events) = endpoint(&factory);
        ep.close().await;
        ep.close().await;
        assert_eq!(ep.signaling_state(), SignalingState::Closed);
        assert!(factory.record(0).unwrap().closed);
        assert!(ep.create_offer().await.is_err());
    }
}
