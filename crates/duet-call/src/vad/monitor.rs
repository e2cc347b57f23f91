//! Runs a [`VoiceActivityDetector`] against a live track.

use std::future::pending;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use super::detector::{VadConfig, VoiceActivityDetector};
use crate::media::{AudioFrame, LocalAudioTrack};

/// A background task analysing one track. Dropping the monitor stops the
/// task and any pending silence timer with it.
pub struct VoiceActivityMonitor {
    changes: mpsc::UnboundedReceiver<bool>,
    task: JoinHandle<()>,
}

impl VoiceActivityMonitor {
    /// Start analysing `track`. Returns `None` when the track exposes no
    /// analysis frames; there is simply no speaking signal in that case.
    pub fn spawn(track: &LocalAudioTrack, config: VadConfig) -> Option<Self> {
        let Some(frames) = track.subscribe_frames() else {
            debug!(track = track.id(), "Track has no analysis frames, VAD disabled");
            return None;
        };
        let (tx, changes) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(frames, VoiceActivityDetector::new(config), tx));
        Some(Self { changes, task })
    }

    /// The next speaking edge. `None` once the track has ended.
    pub async fn changed(&mut self) -> Option<bool> {
        self.changes.recv().await
    }
}

impl Drop for VoiceActivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut frames: tokio::sync::broadcast::Receiver<AudioFrame>,
    mut detector: VoiceActivityDetector,
    tx: mpsc::UnboundedSender<bool>,
) {
    loop {
        let deadline = detector.silence_deadline();
        let change = tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => detector.process(&frame, Instant::now()),
                Err(RecvError::Lagged(skipped)) => {
                    trace!(skipped, "VAD fell behind, skipping frames");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            _ = wait_until(deadline) => detector.poll(Instant::now()),
        };
        if let Some(speaking) = change {
            if tx.send(speaking).is_err() {
                return;
            }
        }
    }

    // Capture stopped mid-utterance.
    if detector.is_speaking() {
        let _ = tx.send(false);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn frame(level: f32) -> AudioFrame {
        Arc::from(
            (0..256)
                .map(|i| if i % 2 == 0 { level } else { -level })
                .collect::<Vec<f32>>(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reports_speech_then_debounced_silence() {
        let (tx, _) = broadcast::channel(16);
        let track = LocalAudioTrack::new("mic").with_frames(tx.clone());
        let mut monitor = VoiceActivityMonitor::spawn(&track, VadConfig::default()).unwrap();

        tx.send(frame(0.5)).unwrap();
        assert_eq!(monitor.changed().await, Some(true));

        let quiet_at = Instant::now();
        tx.send(frame(0.0)).unwrap();
        assert_eq!(monitor.changed().await, Some(false));
        assert!(Instant::now() - quiet_at >= Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_track_ends_monitor() {
        let (tx, _) = broadcast::channel(16);
        let track = LocalAudioTrack::new("mic").with_frames(tx.clone());
        let mut monitor = VoiceActivityMonitor::spawn(&track, VadConfig::default()).unwrap();

        tx.send(frame(0.5)).unwrap();
        assert_eq!(monitor.changed().await, Some(true));

        track.stop();
        drop(tx);
        assert_eq!(monitor.changed().await, Some(false));
        assert_eq!(monitor.changed().await, None);
    }

    #[test]
    fn track_without_frames_has_no_monitor() {
        let track = LocalAudioTrack::new("mic");
        assert!(VoiceActivityMonitor::spawn(&track, VadConfig::default()).is_none());
    }
}
