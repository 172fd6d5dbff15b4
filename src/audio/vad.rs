//! Voice-activity scoring for filtered frames.
//!
//! A frame counts as voice when its energy inside the voice band clears the
//! threshold, or when the fundamental band alone clears a lower bar. The
//! two-scale disjunction keeps weak broadband speech with a strong
//! fundamental from being classified as silence.

use super::denoise::FilteredFrame;

/// Per-frame classification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameLabel {
    Voice,
    Silence,
}

/// Band-energy voice detector.
#[derive(Debug, Clone)]
pub struct VoiceDetector {
    energy_threshold: f32,
    voice_band_hz: (f32, f32),
    fundamental_band_hz: (f32, f32),
}

/// Scale applied to the threshold for full-band energy.
const BAND_SCALE: f32 = 100.0;

/// Scale applied to the threshold for fundamental-band energy.
const FUNDAMENTAL_SCALE: f32 = 50.0;

impl VoiceDetector {
    pub fn new(
        energy_threshold: f32,
        voice_band_hz: (f32, f32),
        fundamental_band_hz: (f32, f32),
    ) -> Self {
        Self {
            energy_threshold,
            voice_band_hz,
            fundamental_band_hz,
        }
    }

    /// Classify one filtered frame.
    pub fn assess(&self, frame: &FilteredFrame) -> FrameLabel {
        let band = frame.band_energy(self.voice_band_hz);
        let fundamental = frame.band_energy(self.fundamental_band_hz);
        if band > self.energy_threshold * BAND_SCALE
            || fundamental > self.energy_threshold * FUNDAMENTAL_SCALE
        {
            FrameLabel::Voice
        } else {
            FrameLabel::Silence
        }
    }
}
