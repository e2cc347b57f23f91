//! Console rendering of controller events and the shared run loop.

use std::future::Future;
use std::time::Duration;

use duet_call::{CallController, CallEvent, TerminalReason};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Log one side's events until its session exits. Returns the reason the
/// call ended with, if any.
pub async fn log_events(
    side: &'static str,
    mut events: mpsc::Receiver<CallEvent>,
    ending_soon_secs: u32,
) -> Option<TerminalReason> {
    while let Some(event) = events.recv().await {
        match event {
            CallEvent::Bound { match_id, role } => {
                info!(side, %match_id, %role, "Bound to match");
            }
            CallEvent::MicReady => info!(side, "Microphone ready"),
            CallEvent::MicrophoneUnavailable(reason) => {
                warn!(side, %reason, "Microphone unavailable, continuing receive-only");
            }
            CallEvent::Connected => info!(side, "Connected"),
            CallEvent::SpeakingChanged(speaking) => debug!(side, speaking, "Speaking changed"),
            CallEvent::MuteChanged(muted) => info!(side, muted, "Mute changed"),
            CallEvent::PartnerMuteChanged(muted) => info!(side, muted, "Partner mute changed"),
            CallEvent::Tick { remaining_secs } => {
                let remaining = duet_call::format_remaining(remaining_secs);
                if duet_call::is_ending_soon(remaining_secs, ending_soon_secs) {
                    info!(side, %remaining, "Call ending soon");
                } else {
                    debug!(side, %remaining, "Tick");
                }
            }
            CallEvent::TerminalReason(reason) => info!(side, %reason, "Call ending"),
            CallEvent::Exited { match_id, reason } => {
                info!(side, %match_id, reason = ?reason, "Session exited");
                return reason;
            }
        }
    }
    None
}

/// Wait for `exits`, hanging `controller` up after `hangup_after` or on
/// Ctrl-C, whichever comes first. Returns what `exits` resolved to.
pub async fn run_until_exit<F>(
    controller: &CallController,
    exits: F,
    hangup_after: Option<Duration>,
) -> F::Output
where
    F: Future,
{
    tokio::pin!(exits);
    let hangup_timer = async {
        match hangup_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(hangup_timer);

    let mut hung_up = false;
    loop {
        tokio::select! {
            output = &mut exits => return output,
            _ = &mut hangup_timer, if !hung_up => {
                hung_up = true;
                info!("Hanging up");
                controller.hangup().await;
            }
            _ = tokio::signal::ctrl_c(), if !hung_up => {
                hung_up = true;
                info!("Interrupted, hanging up");
                controller.hangup().await;
            }
        }
    }
}
