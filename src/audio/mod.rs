//! Audio capture, noise suppression, and voice-activity-gated endpointing.
//!
//! Frames are captured via CPAL as 16-bit mono PCM, run through spectral
//! subtraction, and scored for voice activity. A recording session returns
//! when the speaker falls silent, when no speech arrives at all, or when the
//! caller signals a manual stop.

/// Sample rate the pipeline is tuned for.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// All captured audio is mono.
pub const CHANNELS: u16 = 1;

mod denoise;
mod session;
mod source;
#[cfg(test)]
mod tests;
mod vad;
pub mod wav;

pub use denoise::{FilteredFrame, SpectralDenoiser};
pub use session::{
    stop_channel, CapturedAudio, RecordingSession, SessionConfig, StopHandle, StopToken,
};
pub use source::{list_input_devices, AudioSource, CpalSource, DeviceSelector, FrameRead};
pub use vad::{FrameLabel, VoiceDetector};

/// Downmix interleaved multi-channel input to mono i16 while applying the
/// provided converter, so the session sees a single channel regardless of the
/// microphone layout.
pub(crate) fn append_downmixed_samples<T, F>(
    buf: &mut Vec<i16>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    let to_i16 = |sample: f32| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;

    if channels <= 1 {
        buf.extend(data.iter().copied().map(|s| to_i16(convert(s))));
        return;
    }

    // Average each interleaved frame to produce a mono representation.
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(to_i16(acc / channels as f32));
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(to_i16(acc / count as f32));
    }
}
