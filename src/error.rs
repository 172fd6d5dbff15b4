//! Error taxonomy for the capture core.
//!
//! `NoSpeechDetected` and `EmptyCapture` are recoverable: the caller may
//! prompt the user and retry. `Config` and `Device` are fatal to the session.

use thiserror::Error;

/// Errors produced by a recording session.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Session configuration is invalid or does not match the audio source.
    #[error("invalid capture configuration: {0}")]
    Config(String),

    /// The audio source could not be opened.
    #[error("audio device error: {0}")]
    Device(String),

    /// The initial silence timeout elapsed before any voice activity.
    #[error("no speech detected before the initial timeout")]
    NoSpeechDetected,

    /// The session ended (manual stop) with zero frames captured.
    #[error("recording stopped before any audio was captured")]
    EmptyCapture,

    /// The source stopped delivering frames before anything was captured.
    #[error("audio stream closed unexpectedly: {0}")]
    CaptureIo(String),
}

impl CaptureError {
    /// True for outcomes the caller can recover from by retrying the session.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::NoSpeechDetected | CaptureError::EmptyCapture
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_outcomes_are_retryable() {
        assert!(CaptureError::NoSpeechDetected.is_retryable());
        assert!(CaptureError::EmptyCapture.is_retryable());
        assert!(!CaptureError::Config("rate".into()).is_retryable());
        assert!(!CaptureError::Device("gone".into()).is_retryable());
    }
}
