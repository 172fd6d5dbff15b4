//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{DeviceSelector, SessionConfig};
pub use defaults::{
    DEFAULT_ENERGY_THRESHOLD, DEFAULT_FRAME_SIZE, DEFAULT_HTTP_TIMEOUT_MS,
    DEFAULT_INITIAL_SILENCE_MS, DEFAULT_NOISE_PROFILE_FRAMES, DEFAULT_SAMPLE_RATE,
    DEFAULT_SILENCE_TAIL_MS, DEFAULT_SPECTRAL_FLOOR, DEFAULT_SPECTRAL_GATE, DEFAULT_STT_ENDPOINT,
    DEFAULT_TTS_ENDPOINT, MAX_CAPTURE_HARD_LIMIT_MS,
};

/// CLI options for the talkterm loop. Validated before anything touches a
/// device or the network.
#[derive(Debug, Parser, Clone)]
#[command(name = "talkterm", about = "Voice-activated terminal transcription", version)]
pub struct AppConfig {
    /// Preferred audio input device name (substring match)
    #[arg(long)]
    pub input_device: Option<String>,

    /// Audio input device index, as printed by --list-input-devices
    #[arg(long, conflicts_with = "input_device")]
    pub input_device_index: Option<usize>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Language tag (e.g. en-US, hi-IN); skips the interactive language menu
    #[arg(long)]
    pub language: Option<String>,

    /// Capture sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Samples per capture frame (power of two)
    #[arg(long = "frame-size", default_value_t = DEFAULT_FRAME_SIZE)]
    pub frame_size: usize,

    /// Voice-activity energy threshold
    #[arg(long = "energy-threshold", default_value_t = DEFAULT_ENERGY_THRESHOLD)]
    pub energy_threshold: f32,

    /// Give up if no speech is heard within this window (milliseconds)
    #[arg(long = "initial-silence-ms", default_value_t = DEFAULT_INITIAL_SILENCE_MS)]
    pub initial_silence_ms: u64,

    /// Trailing silence required before stopping capture (milliseconds)
    #[arg(long = "silence-tail-ms", default_value_t = DEFAULT_SILENCE_TAIL_MS)]
    pub silence_tail_ms: u64,

    /// Hard cap on capture duration (milliseconds, 0 disables)
    #[arg(long = "max-capture-ms", default_value_t = 0)]
    pub max_capture_ms: u64,

    /// Frames used to build the noise profile before it is frozen
    #[arg(long = "noise-profile-frames", default_value_t = DEFAULT_NOISE_PROFILE_FRAMES)]
    pub noise_profile_frames: usize,

    /// Fraction of the noise profile subtracted from each spectrum
    #[arg(long = "spectral-gate", default_value_t = DEFAULT_SPECTRAL_GATE)]
    pub spectral_gate: f32,

    /// Fraction of a bin's own magnitude it can never be pushed below
    #[arg(long = "spectral-floor", default_value_t = DEFAULT_SPECTRAL_FLOOR)]
    pub spectral_floor: f32,

    /// Transcription endpoint URL
    #[arg(long = "stt-endpoint", env = "TALKTERM_STT_ENDPOINT", default_value = DEFAULT_STT_ENDPOINT)]
    pub stt_endpoint: String,

    /// Synthesis endpoint URL (used with --speak)
    #[arg(long = "tts-endpoint", env = "TALKTERM_TTS_ENDPOINT", default_value = DEFAULT_TTS_ENDPOINT)]
    pub tts_endpoint: String,

    /// Bearer token for the speech endpoints
    #[arg(long = "api-key", env = "TALKTERM_API_KEY")]
    pub api_key: Option<String>,

    /// HTTP request timeout for speech endpoints (milliseconds)
    #[arg(long = "http-timeout-ms", default_value_t = DEFAULT_HTTP_TIMEOUT_MS)]
    pub http_timeout_ms: u64,

    /// Speak each transcript back through the synthesis endpoint
    #[arg(long = "speak", default_value_t = false)]
    pub speak: bool,

    /// Write each capture to this WAV file (overwritten per capture)
    #[arg(long = "save-wav")]
    pub save_wav: Option<PathBuf>,

    /// Enable JSON trace logging to a temp-dir file
    #[arg(long = "logs", env = "TALKTERM_LOGS", default_value_t = false)]
    pub logs: bool,
}

impl AppConfig {
    /// Which device the capture layer should open.
    pub fn device_selector(&self) -> DeviceSelector {
        if let Some(index) = self.input_device_index {
            DeviceSelector::Index(index)
        } else if let Some(name) = &self.input_device {
            DeviceSelector::Name(name.clone())
        } else {
            DeviceSelector::Default
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        SessionConfig {
            sample_rate: config.sample_rate,
            frame_size: config.frame_size,
            initial_silence_timeout: Duration::from_millis(config.initial_silence_ms),
            post_speech_silence_timeout: Duration::from_millis(config.silence_tail_ms),
            max_capture: match config.max_capture_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            energy_threshold: config.energy_threshold,
            noise_profile_frames: config.noise_profile_frames,
            spectral_gate_factor: config.spectral_gate,
            spectral_floor_factor: config.spectral_floor,
            ..SessionConfig::default()
        }
    }
}
