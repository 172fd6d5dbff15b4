//! Voice-activity-gated recording session with silence-timeout endpointing.
//!
//! The session consumes frames from an [`AudioSource`], runs each frame
//! through spectral noise suppression and voice-activity scoring, and stops
//! on one of three terminal conditions: no speech before the initial timeout,
//! sustained silence after speech, or a manual stop signal. Time is tracked
//! on a logical clock advanced by frame durations (and by the poll interval
//! when the source is idle), so synthetic sources drive the state machine at
//! full speed in tests.

use super::denoise::SpectralDenoiser;
use super::source::{AudioSource, FrameRead};
use super::vad::{FrameLabel, VoiceDetector};
use super::{CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::error::CaptureError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::Duration;

/// Tuning for one recording session. Passed in explicitly; there is no
/// process-wide recognizer state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_rate: u32,
    /// Samples per captured frame; also the FFT size.
    pub frame_size: usize,
    /// Give up if no voice activity is seen within this window.
    pub initial_silence_timeout: Duration,
    /// End the utterance after this much silence once speech has started.
    pub post_speech_silence_timeout: Duration,
    /// Hard cap on utterance length once speech has started, if any.
    pub max_capture: Option<Duration>,
    /// Band considered speech; energy outside it is filtered out entirely.
    pub voice_band_hz: (f32, f32),
    /// Band holding the voice fundamental, scored on its own lower bar.
    pub fundamental_band_hz: (f32, f32),
    pub energy_threshold: f32,
    /// Frames used to build the noise profile before it is frozen.
    pub noise_profile_frames: usize,
    /// Fraction of the noise profile subtracted from each frame's spectrum.
    pub spectral_gate_factor: f32,
    /// Fraction of a bin's own magnitude it can never be pushed below.
    pub spectral_floor_factor: f32,
    /// Cadence of terminal-condition checks.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: 1024,
            initial_silence_timeout: Duration::from_secs(5),
            post_speech_silence_timeout: Duration::from_secs(1),
            max_capture: None,
            voice_band_hz: (85.0, 4000.0),
            fundamental_band_hz: (85.0, 255.0),
            energy_threshold: 300.0,
            noise_profile_frames: 10,
            spectral_gate_factor: 0.3,
            spectral_floor_factor: 0.1,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(8_000..=96_000).contains(&self.sample_rate) {
            return Err(CaptureError::Config(format!(
                "sample rate must be between 8000 and 96000 Hz, got {}",
                self.sample_rate
            )));
        }
        if !(128..=8_192).contains(&self.frame_size) || !self.frame_size.is_power_of_two() {
            return Err(CaptureError::Config(format!(
                "frame size must be a power of two between 128 and 8192, got {}",
                self.frame_size
            )));
        }
        if self.initial_silence_timeout.is_zero() || self.post_speech_silence_timeout.is_zero() {
            return Err(CaptureError::Config(
                "silence timeouts must be non-zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CaptureError::Config(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.energy_threshold <= 0.0 {
            return Err(CaptureError::Config(format!(
                "energy threshold must be positive, got {}",
                self.energy_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.spectral_floor_factor)
            || !(0.0..=1.0).contains(&self.spectral_gate_factor)
            || self.spectral_gate_factor <= self.spectral_floor_factor
        {
            return Err(CaptureError::Config(format!(
                "spectral factors must satisfy 0 <= floor < gate <= 1, got floor {} gate {}",
                self.spectral_floor_factor, self.spectral_gate_factor
            )));
        }
        if self.fundamental_band_hz.0 >= self.fundamental_band_hz.1
            || self.voice_band_hz.0 >= self.voice_band_hz.1
            || self.voice_band_hz.1 > self.sample_rate as f32 / 2.0
        {
            return Err(CaptureError::Config(
                "frequency bands must be ordered and below the Nyquist rate".to_string(),
            ));
        }
        Ok(())
    }
}

/// Raises the one-shot stop signal. Held by the keypress listener (or any
/// other out-of-band trigger); never touches session state directly.
#[derive(Clone)]
pub struct StopHandle {
    sender: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.sender.try_send(());
    }
}

/// Consumed by the session loop; observes the stop signal once.
pub struct StopToken {
    receiver: Receiver<()>,
}

impl StopToken {
    fn is_signaled(&self) -> bool {
        self.receiver.try_recv().is_ok()
    }
}

/// One-shot stop signal pair connecting a stop listener to a session.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (sender, receiver) = bounded(1);
    (StopHandle { sender }, StopToken { receiver })
}

/// The finished capture: contiguous filtered PCM plus its format.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl CapturedAudio {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Mutable session state, owned by the capture loop.
///
/// `silence_started_ms` is set only after speech has started and voice
/// activity has ceased, and is cleared the moment voice resumes.
#[derive(Debug, Default)]
pub(super) struct RecordingState {
    speech_started: bool,
    elapsed_ms: u64,
    silence_started_ms: Option<u64>,
    last_speech_ms: Option<u64>,
    speech_started_ms: Option<u64>,
}

/// Why the loop decided to stop.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Verdict {
    NoSpeech,
    SilenceTimeout,
    PhraseLimit,
}

impl RecordingState {
    pub(super) fn on_frame(&mut self, label: FrameLabel, frame_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(frame_ms);
        match label {
            FrameLabel::Voice => {
                if !self.speech_started {
                    self.speech_started = true;
                    self.speech_started_ms = Some(self.elapsed_ms);
                }
                self.last_speech_ms = Some(self.elapsed_ms);
                self.silence_started_ms = None;
            }
            FrameLabel::Silence => {
                if self.speech_started && self.silence_started_ms.is_none() {
                    self.silence_started_ms = Some(self.elapsed_ms);
                }
            }
        }
    }

    /// The source produced nothing for one poll interval; only the clock moves.
    pub(super) fn on_idle(&mut self, idle_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(idle_ms);
    }

    /// Terminal-condition check. Reads state only; runs on the poll cadence,
    /// not per frame.
    pub(super) fn check(&self, config: &SessionConfig) -> Option<Verdict> {
        if !self.speech_started {
            if self.elapsed_ms > config.initial_silence_timeout.as_millis() as u64 {
                return Some(Verdict::NoSpeech);
            }
            return None;
        }
        if let Some(silence_started) = self.silence_started_ms {
            let tail = self.elapsed_ms.saturating_sub(silence_started);
            if tail > config.post_speech_silence_timeout.as_millis() as u64 {
                return Some(Verdict::SilenceTimeout);
            }
        }
        if let (Some(limit), Some(started)) = (config.max_capture, self.speech_started_ms) {
            if self.elapsed_ms.saturating_sub(started) > limit.as_millis() as u64 {
                return Some(Verdict::PhraseLimit);
            }
        }
        None
    }

    pub(super) fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub(super) fn speech_started(&self) -> bool {
        self.speech_started
    }

    pub(super) fn silence_tail_ms(&self) -> u64 {
        self.silence_started_ms
            .map(|start| self.elapsed_ms.saturating_sub(start))
            .unwrap_or(0)
    }
}

enum SessionEnd {
    Verdict(Verdict),
    ManualStop,
    SourceClosed,
}

/// Owns one capture run from first frame to terminal condition.
pub struct RecordingSession;

impl RecordingSession {
    /// Capture until a terminal condition fires.
    ///
    /// Validates the configuration and the source rate before any frame is
    /// processed. Returns the filtered frames, in capture order, as one
    /// contiguous buffer.
    pub fn start(
        source: &mut dyn AudioSource,
        config: &SessionConfig,
        stop: Option<StopToken>,
    ) -> Result<CapturedAudio, CaptureError> {
        config.validate()?;
        if source.sample_rate() != config.sample_rate {
            return Err(CaptureError::Config(format!(
                "source delivers {} Hz but the session expects {} Hz",
                source.sample_rate(),
                config.sample_rate
            )));
        }

        let frame_ms = ((config.frame_size as u64 * 1000) / config.sample_rate as u64).max(1);
        let poll_ms = config.poll_interval.as_millis() as u64;
        let mut denoiser = SpectralDenoiser::new(
            config.sample_rate,
            config.frame_size,
            config.voice_band_hz,
            config.noise_profile_frames,
            config.spectral_gate_factor,
            config.spectral_floor_factor,
        );
        let detector = VoiceDetector::new(
            config.energy_threshold,
            config.voice_band_hz,
            config.fundamental_band_hz,
        );

        let mut state = RecordingState::default();
        let mut samples: Vec<i16> = Vec::new();
        let mut frames_processed = 0usize;
        let mut next_check_ms = poll_ms;

        let end = loop {
            if let Some(token) = stop.as_ref() {
                if token.is_signaled() {
                    break SessionEnd::ManualStop;
                }
            }

            match source.read_frame(config.poll_interval) {
                FrameRead::Frame(raw) => {
                    let filtered = denoiser.process(&raw);
                    let label = detector.assess(&filtered);
                    samples.extend_from_slice(&filtered.samples);
                    frames_processed += 1;
                    state.on_frame(label, frame_ms);
                }
                FrameRead::TimedOut => state.on_idle(poll_ms),
                FrameRead::Closed => break SessionEnd::SourceClosed,
            }

            if state.elapsed_ms() >= next_check_ms {
                next_check_ms = state.elapsed_ms() - state.elapsed_ms() % poll_ms + poll_ms;
                if let Some(verdict) = state.check(config) {
                    break SessionEnd::Verdict(verdict);
                }
            }
        };

        tracing::debug!(
            frames_processed,
            capture_ms = state.elapsed_ms(),
            speech_started = state.speech_started(),
            silence_tail_ms = state.silence_tail_ms(),
            "recording session ended"
        );

        let captured = CapturedAudio {
            samples,
            sample_rate: config.sample_rate,
            channels: CHANNELS,
        };

        match end {
            SessionEnd::Verdict(Verdict::NoSpeech) => Err(CaptureError::NoSpeechDetected),
            SessionEnd::Verdict(_) => Ok(captured),
            SessionEnd::ManualStop => {
                if captured.samples.is_empty() {
                    Err(CaptureError::EmptyCapture)
                } else {
                    Ok(captured)
                }
            }
            // Best effort: a source that dies mid-session ends the capture
            // with whatever was already recorded.
            SessionEnd::SourceClosed => {
                if captured.samples.is_empty() {
                    Err(CaptureError::CaptureIo(
                        "source closed before any frame was captured".to_string(),
                    ))
                } else {
                    Ok(captured)
                }
            }
        }
    }
}
