use std::time::Duration;

use tokio::time::Instant;

/// Baseline the noise floor starts from after every reset.
const INITIAL_NOISE_FLOOR: f32 = 0.01;

/// Tuning for [`VoiceActivityDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// How long the signal must stay quiet before speaking ends.
    pub silence_time: Duration,
    /// Weight of the previous noise floor in the moving average, `[0, 1)`.
    pub smoothing: f32,
    /// Multiple of the noise floor a frame must exceed to count as speech.
    pub sensitivity: f32,
    /// Number of trailing samples analysed per frame.
    pub window_size: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            silence_time: Duration::from_millis(800),
            smoothing: 0.95,
            sensitivity: 2.2,
            window_size: 1024,
        }
    }
}

/// Energy-based speaking detector with an adaptive noise floor.
///
/// A frame is loud when its RMS exceeds `noise_floor * sensitivity`. Going
/// loud reports speaking immediately; going quiet only reports silence after
/// `silence_time` has passed without another loud frame.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    noise_floor: f32,
    /// Classification of the most recent frame.
    raw_speaking: bool,
    /// Debounced state reported to callers.
    speaking: bool,
    silence_deadline: Option<Instant>,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            noise_floor: INITIAL_NOISE_FLOOR,
            raw_speaking: false,
            speaking: false,
            silence_deadline: None,
        }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    /// When a pending silence transition will fire, if one is armed.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// Classify one buffer of samples in `[-1, 1]`. Returns the new speaking
    /// state when it changed.
    pub fn process(&mut self, samples: &[f32], now: Instant) -> Option<bool> {
        let window = &samples[samples.len().saturating_sub(self.config.window_size)..];
        if window.is_empty() {
            return self.poll(now);
        }

        let sum: f32 = window.iter().map(|s| s * s).sum();
        let rms = (sum / window.len() as f32).sqrt();

        let smoothing = self.config.smoothing;
        self.noise_floor = self.noise_floor * smoothing + rms * (1.0 - smoothing);
        let loud = rms > self.noise_floor * self.config.sensitivity;

        let mut changed = None;
        if loud != self.raw_speaking {
            self.raw_speaking = loud;
            if loud {
                self.silence_deadline = None;
                if !self.speaking {
                    self.speaking = true;
                    changed = Some(true);
                }
            } else {
                self.silence_deadline = Some(now + self.config.silence_time);
            }
        }

        changed.or_else(|| self.poll(now))
    }

    /// Classify unsigned 8-bit time-domain samples centred on 128.
    pub fn process_bytes(&mut self, samples: &[u8], now: Instant) -> Option<bool> {
        let normalized: Vec<f32> = samples
            .iter()
            .map(|&b| (f32::from(b) - 128.0) / 128.0)
            .collect();
        self.process(&normalized, now)
    }

    /// Fire the pending silence transition if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        match self.silence_deadline {
            Some(deadline) if now >= deadline => {
                self.silence_deadline = None;
                if self.speaking {
                    self.speaking = false;
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Forget everything learned from the previous stream.
    pub fn reset(&mut self) {
        self.noise_floor = INITIAL_NOISE_FLOOR;
        self.raw_speaking = false;
        self.speaking = false;
        self.silence_deadline = None;
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(VadConfig::default())
    }
}
