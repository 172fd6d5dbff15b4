use super::defaults::MAX_CAPTURE_HARD_LIMIT_MS;
use super::AppConfig;
use crate::lang;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values before any device or network work starts.
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=96_000).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between 8000 and 96000 Hz, got {}",
                self.sample_rate
            );
        }
        if !(128..=8_192).contains(&self.frame_size) || !self.frame_size.is_power_of_two() {
            bail!(
                "--frame-size must be a power of two between 128 and 8192, got {}",
                self.frame_size
            );
        }
        if self.initial_silence_ms == 0 || self.initial_silence_ms > 60_000 {
            bail!(
                "--initial-silence-ms must be between 1 and 60000, got {}",
                self.initial_silence_ms
            );
        }
        if self.silence_tail_ms == 0 || self.silence_tail_ms > 30_000 {
            bail!(
                "--silence-tail-ms must be between 1 and 30000, got {}",
                self.silence_tail_ms
            );
        }
        if self.max_capture_ms != 0 {
            if self.max_capture_ms > MAX_CAPTURE_HARD_LIMIT_MS {
                bail!(
                    "--max-capture-ms must be at most {MAX_CAPTURE_HARD_LIMIT_MS}, got {}",
                    self.max_capture_ms
                );
            }
            if self.max_capture_ms < self.silence_tail_ms {
                bail!(
                    "--max-capture-ms ({}) cannot be shorter than --silence-tail-ms ({})",
                    self.max_capture_ms,
                    self.silence_tail_ms
                );
            }
        }
        if !self.energy_threshold.is_finite() || self.energy_threshold <= 0.0 {
            bail!(
                "--energy-threshold must be positive, got {}",
                self.energy_threshold
            );
        }
        if !(1..=100).contains(&self.noise_profile_frames) {
            bail!(
                "--noise-profile-frames must be between 1 and 100, got {}",
                self.noise_profile_frames
            );
        }
        if !(0.0..1.0).contains(&self.spectral_floor)
            || !(0.0..=1.0).contains(&self.spectral_gate)
            || self.spectral_gate <= self.spectral_floor
        {
            bail!(
                "spectral factors must satisfy 0 <= --spectral-floor < --spectral-gate <= 1, got floor {} gate {}",
                self.spectral_floor,
                self.spectral_gate
            );
        }
        if self.http_timeout_ms == 0 || self.http_timeout_ms > 120_000 {
            bail!(
                "--http-timeout-ms must be between 1 and 120000, got {}",
                self.http_timeout_ms
            );
        }
        if self.stt_endpoint.trim().is_empty() {
            bail!("--stt-endpoint must not be empty");
        }
        if self.speak && self.tts_endpoint.trim().is_empty() {
            bail!("--tts-endpoint must not be empty when --speak is set");
        }
        if let Some(tag) = &self.language {
            if lang::by_tag(tag).is_none() {
                let supported: Vec<&str> =
                    lang::LANGUAGES.iter().map(|entry| entry.tag).collect();
                bail!(
                    "--language '{}' is not supported; choose one of {}",
                    tag,
                    supported.join(", ")
                );
            }
        }
        Ok(())
    }
}
