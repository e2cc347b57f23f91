//! Call-session lifecycle core.
//!
//! Pairs two matched participants over a peer-to-peer audio connection that
//! is negotiated through a relayed signaling channel. The relay only carries
//! control messages; media never passes through it.
//!
//! Leaf-first: [`vad`] classifies local audio as speaking or silent,
//! [`signaling`] is the match-scoped message bus, [`session`] owns one
//! negotiation per match, [`timer`] bounds the call length, and
//! [`controller`] binds all of it to the match the matcher hands out and
//! guarantees teardown happens exactly once.

pub mod controller;
pub mod endpoint;
pub mod error;
pub mod loopback;
pub mod media;
pub mod protocol;
pub mod session;
pub mod signaling;
pub mod timer;
pub mod vad;

pub use controller::{
    CallController, CallEvent, CallStatus, ControllerConfig, TerminalReason,
};
pub use endpoint::{EndpointEvent, EndpointFactory, IceServer, NegotiationEndpoint, SignalingState};
pub use error::CallError;
pub use loopback::{EndpointRecord, LoopbackDevices, LoopbackEndpointFactory};
pub use media::{AudioConstraints, AudioDevices, AudioFrame, LocalAudioStream, LocalAudioTrack, RemoteAudio};
pub use protocol::{IceCandidate, Role, SdpType, SessionDescription, SignalKind, SignalMessage};
pub use session::{MicrophoneStatus, PeerConnectionSession, SessionSettings, SessionState, SignalOutcome};
pub use signaling::{MemoryRelay, MemorySignalingChannel, SignalingChannel, Subscription, WsSignalingChannel, WsSignalingConfig};
pub use timer::{format_remaining, is_ending_soon, MatchSessionTimer, TimerTick};
pub use vad::{VadConfig, VoiceActivityDetector, VoiceActivityMonitor};
