//! Public handle for the call controller task.

use std::sync::Arc;

use duet_common::MatchId;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use super::event_loop::ControllerLoop;
use super::types::{CallEvent, CallStatus, ControllerCommand, ControllerConfig};
use crate::endpoint::EndpointFactory;
use crate::media::AudioDevices;
use crate::protocol::Role;
use crate::signaling::SignalingChannel;

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Handle to a running call controller.
///
/// All methods are non-blocking and send commands to the background task.
pub struct CallController {
    command_tx: mpsc::Sender<ControllerCommand>,
    status: Arc<RwLock<CallStatus>>,
    task: JoinHandle<()>,
}

impl CallController {
    /// Start the controller task. Returns `(controller, event_receiver)`.
    pub fn spawn(
        config: ControllerConfig,
        signaling: Arc<dyn SignalingChannel>,
        devices: Arc<dyn AudioDevices>,
        endpoints: Arc<dyn EndpointFactory>,
    ) -> (Self, mpsc::Receiver<CallEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let status = Arc::new(RwLock::new(CallStatus::default()));

        let event_loop = ControllerLoop::new(
            config,
            signaling,
            devices,
            endpoints,
            Arc::clone(&status),
            event_tx,
        );
        let task = tokio::spawn(event_loop.run(command_rx));

        (
            Self {
                command_tx,
                status,
                task,
            },
            event_rx,
        )
    }

    /// Bind to `match_id`. Rebinding the current match is a no-op; any other
    /// id disposes the current session first.
    pub async fn bind(&self, match_id: MatchId, role: Role) {
        self.send(ControllerCommand::Bind { match_id, role }).await;
    }

    /// Enable or disable audio mode. The initiator starts negotiating the
    /// first time audio is enabled while bound.
    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.send(ControllerCommand::SetAudioEnabled(enabled)).await;
    }

    pub async fn toggle_mute(&self) {
        self.send(ControllerCommand::ToggleMute).await;
    }

    /// End the call locally and tell the partner.
    pub async fn hangup(&self) {
        self.send(ControllerCommand::Hangup).await;
    }

    /// The matcher reports that the partner left.
    pub async fn partner_left(&self) {
        self.send(ControllerCommand::PartnerLeft).await;
    }

    /// The matcher reports that the match expired.
    pub async fn match_timeout(&self) {
        self.send(ControllerCommand::MatchTimeout).await;
    }

    pub async fn status(&self) -> CallStatus {
        self.status.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Hang up if needed and wait for the task to finish.
    pub async fn shutdown(self) {
        self.send(ControllerCommand::Shutdown).await;
        let _ = self.task.await;
    }

    async fn send(&self, command: ControllerCommand) {
        if self.command_tx.send(command).await.is_err() {
            debug!("Call controller already stopped");
        }
    }
}
