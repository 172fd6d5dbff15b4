//! WAV encoding for captured PCM.

use super::CapturedAudio;
use anyhow::Result;
use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::path::Path;

fn spec_for(audio: &CapturedAudio) -> WavSpec {
    WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode a capture as an in-memory WAV file, ready to post to a
/// transcription service.
pub fn to_wav_bytes(audio: &CapturedAudio) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec_for(audio))?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Write a capture to a WAV file on disk.
pub fn write_wav<P: AsRef<Path>>(audio: &CapturedAudio, path: P) -> Result<()> {
    let mut writer = WavWriter::create(path, spec_for(audio))?;
    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
