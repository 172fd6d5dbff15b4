pub mod audio;
pub mod config;
pub mod error;
pub mod lang;
pub mod stt;
pub mod telemetry;
pub mod tts;

pub use audio::{
    stop_channel, CapturedAudio, RecordingSession, SessionConfig, StopHandle, StopToken,
};
pub use config::AppConfig;
pub use error::CaptureError;
