//! Local and remote audio handles.
//!
//! A [`LocalAudioStream`] is the microphone capture a session owns. Its
//! tracks can be muted by flipping their enabled flag and are released with
//! [`LocalAudioStream::stop_all`]. Analysis frames are fanned out on a
//! broadcast channel so the voice activity monitor can tap them without
//! taking ownership of the capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::CallError;

/// One analysis buffer of mono samples in `[-1.0, 1.0]`.
pub type AudioFrame = Arc<[f32]>;

/// Processing requested from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Opens the microphone. Implemented by the platform audio layer.
#[async_trait]
pub trait AudioDevices: Send + Sync {
    async fn open_microphone(
        &self,
        constraints: AudioConstraints,
    ) -> Result<LocalAudioStream, CallError>;
}

// ---------------------------------------------------------------------------
// Local tracks
// ---------------------------------------------------------------------------

type StopHook = Box<dyn FnOnce() + Send>;

struct TrackInner {
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
    frames: Mutex<Option<broadcast::Sender<AudioFrame>>>,
    on_stop: Mutex<Option<StopHook>>,
}

/// Handle to one captured audio track. Clones share the same track.
#[derive(Clone)]
pub struct LocalAudioTrack {
    inner: Arc<TrackInner>,
}

impl LocalAudioTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                enabled: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
                frames: Mutex::new(None),
                on_stop: Mutex::new(None),
            }),
        }
    }

    /// Attach the sender analysis frames are published on.
    pub fn with_frames(self, frames: broadcast::Sender<AudioFrame>) -> Self {
        *lock(&self.inner.frames) = Some(frames);
        self
    }

    /// Run `hook` once when the track is stopped (releases the device).
    pub fn on_stop(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *lock(&self.inner.on_stop) = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Stop capture. Only the first call has any effect.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.enabled.store(false, Ordering::Release);
        lock(&self.inner.frames).take();
        if let Some(hook) = lock(&self.inner.on_stop).take() {
            hook();
        }
    }

    /// Subscribe to analysis frames. `None` when the track is stopped or the
    /// device does not expose frames.
    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<AudioFrame>> {
        lock(&self.inner.frames).as_ref().map(|tx| tx.subscribe())
    }
}

impl std::fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("id", &self.inner.id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// A microphone capture: one stream, usually one audio track.
#[derive(Debug, Clone)]
pub struct LocalAudioStream {
    pub id: String,
    tracks: Vec<LocalAudioTrack>,
}

impl LocalAudioStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalAudioTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn tracks(&self) -> &[LocalAudioTrack] {
        &self.tracks
    }

    pub fn audio_track(&self) -> Option<&LocalAudioTrack> {
        self.tracks.first()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Handle to the partner's audio as surfaced by the negotiation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAudio {
    pub stream_id: String,
    pub track_id: String,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
