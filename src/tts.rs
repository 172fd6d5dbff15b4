//! Speech synthesis client and OS-level playback.
//!
//! Synthesis mirrors the transcription client: a trait seam over a blocking
//! HTTP call that returns encoded audio bytes. Playback writes the bytes to a
//! temp file and hands it to the platform's audio player, which is all the
//! voice-to-voice loop needs.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// Categorized synthesis failures.
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("synthesis request timed out")]
    Timeout,
    #[error("synthesis service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Turns text plus a language tag into playable audio bytes.
pub trait SynthesisClient {
    fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, TtsError>;
}

/// Blocking HTTP synthesis client posting `{"input", "language"}` and
/// receiving encoded audio back.
pub struct HttpSynthesizer {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build synthesis HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl SynthesisClient for HttpSynthesizer {
    fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, TtsError> {
        tracing::debug!(chars = text.len(), language, "starting synthesis request");

        let body = json!({ "input": text, "language": language });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                TtsError::Timeout
            } else {
                TtsError::ServiceUnavailable(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::ServiceUnavailable(format!(
                "synthesis API returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|err| TtsError::ServiceUnavailable(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn playback_path() -> PathBuf {
    std::env::temp_dir().join(format!("talkterm_reply_{}.audio", std::process::id()))
}

fn player_command(path: &PathBuf) -> Command {
    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("afplay");
        cmd.arg(path);
        cmd
    }
    #[cfg(target_os = "windows")]
    {
        let mut cmd = Command::new("powershell");
        cmd.arg("-c")
            .arg(format!("(New-Object Media.SoundPlayer '{}').PlaySync()", path.display()));
        cmd
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut cmd = Command::new("aplay");
        cmd.arg("-q").arg(path);
        cmd
    }
}

/// Write synthesized audio to a temp file and play it with the system
/// player, blocking until playback finishes. The temp file is removed
/// afterwards regardless of the player's exit status.
pub fn play(audio: &[u8]) -> Result<()> {
    let path = playback_path();
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(audio)?;
    drop(file);

    let status = player_command(&path).status();
    let _ = std::fs::remove_file(&path);

    let status = status.context("failed to launch the system audio player")?;
    if !status.success() {
        return Err(anyhow!("audio player exited with {status}"));
    }
    Ok(())
}
