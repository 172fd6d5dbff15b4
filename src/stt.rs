//! Cloud transcription client.
//!
//! The recording session hands its capture to a [`TranscriptionClient`]; the
//! wire details live behind the trait so tests can substitute a scripted
//! client. The HTTP implementation posts WAV bytes plus a language tag to a
//! whisper-style endpoint and maps failures onto the three outcomes the
//! caller distinguishes: timeout, unrecognized speech, service unavailable.

use crate::audio::{wav, CapturedAudio};
use anyhow::{Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Categorized transcription failures.
#[derive(Error, Debug)]
pub enum SttError {
    /// The service did not answer in time.
    #[error("transcription request timed out")]
    Timeout,
    /// The service answered but produced no usable text.
    #[error("could not understand the audio")]
    Unrecognized,
    /// Transport failure or a server-side error.
    #[error("transcription service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl SttError {
    /// True when a fresh capture attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SttError::Timeout | SttError::Unrecognized)
    }
}

/// Turns a capture plus a language tag into recognized text.
pub trait TranscriptionClient {
    fn transcribe(&self, audio: &CapturedAudio, language: &str) -> Result<String, SttError>;
}

#[derive(Deserialize)]
struct TranscriptResponse {
    text: String,
}

/// Blocking HTTP transcription client.
pub struct HttpTranscriber {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranscriber {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build transcription HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

fn classify_status(status: StatusCode) -> Result<(), SttError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return Err(SttError::Timeout);
    }
    Err(SttError::ServiceUnavailable(format!(
        "transcription API returned {status}"
    )))
}

fn finish(text: String) -> Result<String, SttError> {
    let trimmed = text.trim().to_string();
    if trimmed.is_empty() {
        Err(SttError::Unrecognized)
    } else {
        Ok(trimmed)
    }
}

impl TranscriptionClient for HttpTranscriber {
    fn transcribe(&self, audio: &CapturedAudio, language: &str) -> Result<String, SttError> {
        tracing::debug!(
            samples = audio.samples.len(),
            language,
            "starting transcription request"
        );

        let wav_bytes = wav::to_wav_bytes(audio)
            .map_err(|err| SttError::ServiceUnavailable(format!("WAV encoding failed: {err}")))?;

        let part = Part::bytes(wav_bytes)
            .file_name("capture.wav")
            .mime_str("audio/wav")
            .map_err(|err| SttError::ServiceUnavailable(err.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("language", language.to_string());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                SttError::Timeout
            } else {
                SttError::ServiceUnavailable(err.to_string())
            }
        })?;

        classify_status(response.status())?;

        let parsed: TranscriptResponse = response
            .json()
            .map_err(|err| SttError::ServiceUnavailable(format!("malformed response: {err}")))?;

        tracing::debug!(chars = parsed.text.len(), "transcription response received");
        finish(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_pass_through() {
        assert!(classify_status(StatusCode::OK).is_ok());
    }

    #[test]
    fn timeout_statuses_map_to_timeout() {
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT),
            Err(SttError::Timeout)
        ));
        assert!(matches!(
            classify_status(StatusCode::REQUEST_TIMEOUT),
            Err(SttError::Timeout)
        ));
    }

    #[test]
    fn server_errors_map_to_unavailable() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(SttError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn blank_transcript_is_unrecognized() {
        assert!(matches!(
            finish("   ".to_string()),
            Err(SttError::Unrecognized)
        ));
        assert_eq!(finish(" hello ".to_string()).unwrap(), "hello");
    }

    #[test]
    fn timeout_and_unrecognized_are_retryable() {
        assert!(SttError::Timeout.is_retryable());
        assert!(SttError::Unrecognized.is_retryable());
        assert!(!SttError::ServiceUnavailable("down".into()).is_retryable());
    }
}
