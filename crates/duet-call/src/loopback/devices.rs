use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::CallError;
use crate::media::{AudioConstraints, AudioDevices, AudioFrame, LocalAudioStream, LocalAudioTrack};

const FRAME_INTERVAL: Duration = Duration::from_millis(20);
const FRAME_SAMPLES: usize = 320;
const SAMPLE_RATE: f32 = 16_000.0;
/// Frames per talk or pause phase of the synthetic voice (1.5s).
const PHASE_FRAMES: u64 = 75;

#[derive(Default)]
struct DevicesInner {
    denied: AtomicBool,
    synthetic_voice: AtomicBool,
    opened: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    last_constraints: Mutex<Option<AudioConstraints>>,
}

/// A fake capture device.
#[derive(Clone, Default)]
pub struct LoopbackDevices {
    inner: Arc<DevicesInner>,
}

impl LoopbackDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce alternating bursts of tone and silence on every opened track.
    pub fn with_synthetic_voice(self) -> Self {
        self.inner.synthetic_voice.store(true, Ordering::Release);
        self
    }

    /// Make the next `open_microphone` calls fail as if permission was denied.
    pub fn set_denied(&self, denied: bool) {
        self.inner.denied.store(denied, Ordering::Release);
    }

    /// Total successful opens.
    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::Acquire)
    }

    /// Captures currently held.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Highest number of captures held at the same time.
    pub fn max_active(&self) -> usize {
        self.inner.max_active.load(Ordering::Acquire)
    }

    pub fn last_constraints(&self) -> Option<AudioConstraints> {
        *self
            .inner
            .last_constraints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AudioDevices for LoopbackDevices {
    async fn open_microphone(
        &self,
        constraints: AudioConstraints,
    ) -> Result<LocalAudioStream, CallError> {
        *self
            .inner
            .last_constraints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(constraints);

        if self.inner.denied.load(Ordering::Acquire) {
            info!("Microphone permission denied");
            return Err(CallError::MicrophoneUnavailable(
                "permission denied".to_string(),
            ));
        }

        let n = self.inner.opened.fetch_add(1, Ordering::AcqRel) + 1;
        let active = self.inner.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.max_active.fetch_max(active, Ordering::AcqRel);

        let (frames, _) = broadcast::channel(32);
        let inner = Arc::clone(&self.inner);
        let track = LocalAudioTrack::new(format!("loopback-mic-{n}"))
            .with_frames(frames.clone())
            .on_stop(move || {
                inner.active.fetch_sub(1, Ordering::AcqRel);
                debug!("Loopback microphone released");
            });

        if self.inner.synthetic_voice.load(Ordering::Acquire) {
            tokio::spawn(synthetic_voice(track.clone(), frames));
        }

        debug!(track = track.id(), ?constraints, "Loopback microphone opened");
        Ok(LocalAudioStream::new(
            format!("loopback-stream-{n}"),
            vec![track],
        ))
    }
}

/// Feed a 220 Hz tone that talks for 1.5s and pauses for 1.5s. Muted tracks
/// produce silence. Ends when the track stops.
async fn synthetic_voice(track: LocalAudioTrack, frames: broadcast::Sender<AudioFrame>) {
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    let mut frame_no: u64 = 0;
    while !track.is_stopped() {
        interval.tick().await;
        let talking = (frame_no / PHASE_FRAMES) % 2 == 0;
        let frame: AudioFrame = if talking && track.is_enabled() {
            let offset = frame_no as usize * FRAME_SAMPLES;
            (0..FRAME_SAMPLES)
                .map(|i| {
                    let t = (offset + i) as f32 / SAMPLE_RATE;
                    0.3 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                })
                .collect()
        } else {
            Arc::from(vec![0.0_f32; FRAME_SAMPLES])
        };
        // No analyser attached is fine.
        let _ = frames.send(frame);
        frame_no += 1;
    }
}
