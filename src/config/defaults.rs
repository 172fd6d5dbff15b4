//! Built-in defaults and validation bounds for CLI flags.

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_SIZE: usize = 1_024;
pub const DEFAULT_INITIAL_SILENCE_MS: u64 = 5_000;
pub const DEFAULT_SILENCE_TAIL_MS: u64 = 1_000;
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 300.0;
pub const DEFAULT_NOISE_PROFILE_FRAMES: usize = 10;
pub const DEFAULT_SPECTRAL_GATE: f32 = 0.3;
pub const DEFAULT_SPECTRAL_FLOOR: f32 = 0.1;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_STT_ENDPOINT: &str = "http://127.0.0.1:8085/v1/audio/transcriptions";
pub const DEFAULT_TTS_ENDPOINT: &str = "http://127.0.0.1:8085/v1/audio/speech";

/// Upper bound on --max-capture-ms; longer utterances should be split anyway.
pub const MAX_CAPTURE_HARD_LIMIT_MS: u64 = 600_000;
