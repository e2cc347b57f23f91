//! The negotiation endpoint seam.
//!
//! A [`NegotiationEndpoint`] is the peer-to-peer connection object that runs
//! offer/answer and candidate exchange. Candidate gathering and media
//! transport live behind it; the session only drives it. Endpoints report
//! asynchronous discoveries (local candidates, the remote track) on the
//! [`EndpointEvent`] channel they are created with.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CallError;
use crate::media::{LocalAudioTrack, RemoteAudio};
use crate::protocol::{IceCandidate, SessionDescription};

/// Offer/answer state of an endpoint, as defined by JSEP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// Something the endpoint discovered on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteAudio),
}

/// A STUN or TURN server handed to the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[async_trait]
pub trait NegotiationEndpoint: Send + Sync {
    fn signaling_state(&self) -> SignalingState;

    async fn add_track(&mut self, track: &LocalAudioTrack) -> Result<(), CallError>;

    async fn create_offer(&mut self) -> Result<SessionDescription, CallError>;

    async fn create_answer(&mut self) -> Result<SessionDescription, CallError>;

    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<(), CallError>;

    async fn set_remote_description(&mut self, desc: SessionDescription)
        -> Result<(), CallError>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), CallError>;

    /// Release the connection. Must be safe to call in any state.
    async fn close(&mut self);
}

/// Builds one endpoint per session.
pub trait EndpointFactory: Send + Sync {
    fn create(
        &self,
        ice_servers: &[IceServer],
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Result<Box<dyn NegotiationEndpoint>, CallError>;
}
