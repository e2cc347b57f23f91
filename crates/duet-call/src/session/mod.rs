//! One negotiation session per match.

mod peer;
mod state;


pub use peer::{PeerConnectionSession, SessionSettings};
pub use state::{MicrophoneStatus, SessionState, SignalOutcome};
