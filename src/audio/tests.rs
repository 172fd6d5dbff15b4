use super::denoise::{FilteredFrame, SpectralDenoiser};
use super::session::{stop_channel, RecordingState, SessionConfig, Verdict};
use super::source::{AudioSource, FrameChunker, FrameRead};
use super::vad::{FrameLabel, VoiceDetector};
use super::{append_downmixed_samples, wav, RecordingSession, StopHandle};
use crate::error::CaptureError;
use crossbeam_channel::bounded;
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

const SAMPLE_RATE: u32 = 16_000;
const FRAME_SIZE: usize = 1_024;
const BIN_HZ: f32 = SAMPLE_RATE as f32 / FRAME_SIZE as f32;

fn sine_frame(freq: f32, amplitude: f32) -> Vec<i16> {
    (0..FRAME_SIZE)
        .map(|n| {
            let phase = 2.0 * PI * freq * n as f32 / SAMPLE_RATE as f32;
            (amplitude * phase.sin()) as i16
        })
        .collect()
}

fn silence_frame() -> Vec<i16> {
    vec![0i16; FRAME_SIZE]
}

/// Synthetic frame with energy placed in specific bins, for detector tests.
fn spectrum_frame(bins: &[(usize, f32)]) -> FilteredFrame {
    let mut spectrum = vec![0.0f32; FRAME_SIZE / 2 + 1];
    for &(bin, magnitude) in bins {
        spectrum[bin] = magnitude;
    }
    FilteredFrame {
        samples: Vec::new(),
        spectrum,
        bin_hz: BIN_HZ,
    }
}

// ---- downmix + chunker ----------------------------------------------------

#[test]
fn downmixes_stereo_by_averaging() {
    let mut buf = Vec::new();
    let samples = [1.0f32, 0.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![16383, 16383]);
}

#[test]
fn downmix_clamps_out_of_range_samples() {
    let mut buf = Vec::new();
    let samples = [2.0f32, -2.0];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, vec![i16::MAX, -i16::MAX]);
}

#[test]
fn chunker_emits_fixed_frames_and_counts_drops() {
    let (sender, receiver) = bounded::<Vec<i16>>(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut chunker = FrameChunker::new(4, sender, dropped.clone());

    let samples: Vec<f32> = (0..12).map(|n| n as f32 / 100.0).collect();
    chunker.push(&samples, 1, |sample| sample);

    let frame = receiver.try_recv().unwrap();
    assert_eq!(frame.len(), 4);
    assert_eq!(dropped.load(std::sync::atomic::Ordering::Relaxed), 2);
}

// ---- spectral denoiser ----------------------------------------------------

#[test]
fn zero_profile_passes_in_band_sine_through() {
    // No profile frames means the subtraction term stays zero and an
    // in-band tone should survive the round trip nearly untouched.
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 0, 0.3, 0.1);
    let input = sine_frame(250.0, 8_000.0);
    let output = denoiser.process(&input);

    assert_eq!(output.samples.len(), input.len());
    let max_diff = input
        .iter()
        .zip(output.samples.iter())
        .map(|(a, b)| (i32::from(*a) - i32::from(*b)).abs())
        .max()
        .unwrap();
    assert!(max_diff <= 4, "round-trip drift {max_diff} too large");
}

#[test]
fn resuppressing_filtered_samples_is_a_no_op() {
    // With a frozen zero profile the suppression rule leaves in-band bins
    // untouched and out-of-band bins at zero, so a second pass over already
    // filtered samples has nothing left to change beyond i16 quantization.
    let mut first = SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 0, 0.3, 0.1);
    let once = first.process(&sine_frame(250.0, 8_000.0));

    let mut second = SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 0, 0.3, 0.1);
    let twice = second.process(&once.samples);

    assert_eq!(twice.samples.len(), once.samples.len());
    let max_diff = once
        .samples
        .iter()
        .zip(twice.samples.iter())
        .map(|(a, b)| (i32::from(*a) - i32::from(*b)).abs())
        .max()
        .unwrap();
    assert!(max_diff <= 2, "second suppression pass drifted by {max_diff}");
}

#[test]
fn out_of_band_energy_is_removed() {
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 0, 0.3, 0.1);
    // 6 kHz sits above the voice band; bin 384 exactly. What survives is
    // only the quantization noise the i16 sine leaks into other bins.
    let output = denoiser.process(&sine_frame(6_000.0, 8_000.0));

    assert_eq!(output.spectrum[384], 0.0);
    let peak = output.samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
    assert!(peak <= 5, "residual amplitude {peak} after band rejection");
    assert!(output.band_energy((85.0, 4000.0)) < 100.0);
}

#[test]
fn profile_frames_are_suppressed_against_their_own_average() {
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 1, 0.3, 0.1);
    // First frame becomes the whole profile, so it keeps 1 - gate of its
    // own magnitude.
    let frame = denoiser.process(&sine_frame(250.0, 8_000.0));

    let bin = (250.0 / BIN_HZ) as usize;
    let raw = 8_000.0 * FRAME_SIZE as f32 / 2.0;
    let expected = 0.7 * raw;
    let got = frame.spectrum[bin];
    assert!(
        (got - expected).abs() / expected < 0.02,
        "expected ~{expected}, got {got}"
    );
}

#[test]
fn floor_limits_suppression_of_quiet_frames() {
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 1, 0.3, 0.1);
    denoiser.process(&sine_frame(250.0, 8_000.0));
    // Quiet tone against a loud profile: subtraction would go negative, the
    // floor keeps a tenth of the bin's own magnitude.
    let frame = denoiser.process(&sine_frame(250.0, 500.0));

    let bin = (250.0 / BIN_HZ) as usize;
    let expected = 0.1 * 500.0 * FRAME_SIZE as f32 / 2.0;
    let got = frame.spectrum[bin];
    assert!(
        (got - expected).abs() / expected < 0.05,
        "expected ~{expected}, got {got}"
    );
}

#[test]
fn profile_freezes_after_configured_frames() {
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 2, 0.3, 0.1);
    for _ in 0..5 {
        denoiser.process(&silence_frame());
    }
    assert_eq!(denoiser.profile_frames_seen(), 2);
}

#[test]
fn short_final_frame_keeps_its_length() {
    let mut denoiser =
        SpectralDenoiser::new(SAMPLE_RATE, FRAME_SIZE, (85.0, 4000.0), 0, 0.3, 0.1);
    let output = denoiser.process(&vec![100i16; 300]);
    assert_eq!(output.samples.len(), 300);
}

// ---- voice detector -------------------------------------------------------

#[test]
fn band_energy_normalizes_by_frame_size() {
    // One bin of magnitude 1024 in a 1024-sample frame: 1024^2 / 1024.
    let frame = spectrum_frame(&[(16, 1_024.0)]);
    let energy = frame.band_energy((85.0, 4000.0));
    assert!((energy - 1_024.0).abs() < 1.0);
}

#[test]
fn band_energy_over_bar_is_voice() {
    let detector = VoiceDetector::new(10.0, (85.0, 4000.0), (85.0, 255.0));
    // Bin 100 (~1.6 kHz) is outside the fundamental band, so only the
    // full-band bar (threshold x 100 = 1000) can flag it.
    let magnitude = (1_200.0f32 * FRAME_SIZE as f32).sqrt();
    let frame = spectrum_frame(&[(100, magnitude)]);
    assert_eq!(detector.assess(&frame), FrameLabel::Voice);
}

#[test]
fn fundamental_alone_clears_its_lower_bar() {
    let detector = VoiceDetector::new(10.0, (85.0, 4000.0), (85.0, 255.0));
    // Bin 10 (~156 Hz): 600 energy misses the band bar (1000) but clears
    // the fundamental bar (threshold x 50 = 500).
    let magnitude = (600.0f32 * FRAME_SIZE as f32).sqrt();
    let frame = spectrum_frame(&[(10, magnitude)]);
    assert_eq!(detector.assess(&frame), FrameLabel::Voice);
}

#[test]
fn energy_below_both_bars_is_silence() {
    let detector = VoiceDetector::new(10.0, (85.0, 4000.0), (85.0, 255.0));
    let magnitude = (300.0f32 * FRAME_SIZE as f32).sqrt();
    let frame = spectrum_frame(&[(10, magnitude)]);
    assert_eq!(detector.assess(&frame), FrameLabel::Silence);
}

// ---- recording state ------------------------------------------------------

#[test]
fn silence_mark_requires_prior_speech() {
    let mut state = RecordingState::default();
    for _ in 0..5 {
        state.on_frame(FrameLabel::Silence, 100);
    }
    assert!(!state.speech_started());
    assert_eq!(state.silence_tail_ms(), 0);
}

#[test]
fn voice_resume_clears_the_silence_mark() {
    let mut state = RecordingState::default();
    state.on_frame(FrameLabel::Voice, 100);
    state.on_frame(FrameLabel::Silence, 100);
    state.on_frame(FrameLabel::Silence, 100);
    assert_eq!(state.silence_tail_ms(), 100);

    state.on_frame(FrameLabel::Voice, 100);
    assert_eq!(state.silence_tail_ms(), 0);
}

#[test]
fn no_speech_verdict_fires_only_before_speech() {
    let config = SessionConfig::default();
    let mut state = RecordingState::default();
    for _ in 0..50 {
        state.on_idle(100);
    }
    assert_eq!(state.check(&config), None);
    state.on_idle(100);
    assert_eq!(state.check(&config), Some(Verdict::NoSpeech));

    let mut spoke = RecordingState::default();
    spoke.on_frame(FrameLabel::Voice, 100);
    for _ in 0..60 {
        spoke.on_idle(100);
    }
    // Speech happened, so only the post-speech timeout can end the session,
    // and the silence mark was never set by idle polls alone.
    assert_eq!(spoke.check(&config), None);
}

#[test]
fn post_speech_timeout_is_strictly_greater_than() {
    let config = SessionConfig::default();
    let mut state = RecordingState::default();
    state.on_frame(FrameLabel::Voice, 100);
    for _ in 0..11 {
        state.on_frame(FrameLabel::Silence, 100);
    }
    assert_eq!(state.silence_tail_ms(), 1_000);
    assert_eq!(state.check(&config), None);

    state.on_frame(FrameLabel::Silence, 100);
    assert_eq!(state.check(&config), Some(Verdict::SilenceTimeout));
}

#[test]
fn phrase_limit_measured_from_speech_start() {
    let mut config = SessionConfig::default();
    config.max_capture = Some(Duration::from_millis(500));

    let mut state = RecordingState::default();
    state.on_idle(1_000);
    // The cap is anchored at speech onset, not session start.
    assert_eq!(state.check(&config), None);

    state.on_frame(FrameLabel::Voice, 100);
    for _ in 0..5 {
        state.on_frame(FrameLabel::Voice, 100);
    }
    assert_eq!(state.check(&config), None);
    state.on_frame(FrameLabel::Voice, 100);
    assert_eq!(state.check(&config), Some(Verdict::PhraseLimit));
}

// ---- session over a scripted source ---------------------------------------

enum AfterScript {
    TimedOut,
    Closed,
}

struct ScriptedSource {
    rate: u32,
    frames: VecDeque<Vec<i16>>,
    after: AfterScript,
    stop_when_drained: Option<StopHandle>,
}

impl ScriptedSource {
    fn new(rate: u32, frames: Vec<Vec<i16>>) -> Self {
        Self {
            rate,
            frames: frames.into(),
            after: AfterScript::TimedOut,
            stop_when_drained: None,
        }
    }
}

impl AudioSource for ScriptedSource {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn read_frame(&mut self, _timeout: Duration) -> FrameRead {
        if let Some(frame) = self.frames.pop_front() {
            return FrameRead::Frame(frame);
        }
        if let Some(stop) = self.stop_when_drained.take() {
            stop.stop();
        }
        match self.after {
            AfterScript::TimedOut => FrameRead::TimedOut,
            AfterScript::Closed => FrameRead::Closed,
        }
    }
}

#[test]
fn session_fails_when_no_speech_arrives_in_time() {
    let mut source = ScriptedSource::new(SAMPLE_RATE, Vec::new());
    let config = SessionConfig::default();
    let result = RecordingSession::start(&mut source, &config, None);
    assert!(matches!(result, Err(CaptureError::NoSpeechDetected)));
}

#[test]
fn session_captures_leading_silence_speech_and_tail() {
    let mut frames = Vec::new();
    for _ in 0..15 {
        frames.push(silence_frame());
    }
    for _ in 0..16 {
        frames.push(sine_frame(250.0, 8_000.0));
    }
    for _ in 0..30 {
        frames.push(silence_frame());
    }
    let mut source = ScriptedSource::new(SAMPLE_RATE, frames);
    let config = SessionConfig::default();

    let audio = RecordingSession::start(&mut source, &config, None).unwrap();
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len() % FRAME_SIZE, 0);
    // Everything up to the endpoint boundary is kept: leading silence, the
    // utterance, and roughly one second of tail. Never trimmed to speech.
    assert!(audio.samples.len() >= (15 + 16 + 16) * FRAME_SIZE);
    assert!(audio.samples.len() <= (15 + 16 + 20) * FRAME_SIZE);
}

#[test]
fn session_honors_explicit_timeouts_and_threshold() {
    // Same endpointing walk at non-default tuning: five-second initial and
    // post-speech windows, threshold 30.
    let mut config = SessionConfig::default();
    config.initial_silence_timeout = Duration::from_secs(5);
    config.post_speech_silence_timeout = Duration::from_secs(5);
    config.energy_threshold = 30.0;

    let mut frames = Vec::new();
    for _ in 0..10 {
        frames.push(silence_frame());
    }
    for _ in 0..16 {
        frames.push(sine_frame(250.0, 8_000.0));
    }
    for _ in 0..90 {
        frames.push(silence_frame());
    }
    let mut source = ScriptedSource::new(SAMPLE_RATE, frames);

    let audio = RecordingSession::start(&mut source, &config, None).unwrap();
    // The tail runs a full five seconds past the last voice frame before
    // the endpoint fires, and everything before it is kept.
    assert!(audio.samples.len() >= (10 + 16 + 79) * FRAME_SIZE);
    assert!(audio.samples.len() <= (10 + 16 + 84) * FRAME_SIZE);

    let mut quiet = ScriptedSource::new(SAMPLE_RATE, Vec::new());
    let result = RecordingSession::start(&mut quiet, &config, None);
    assert!(matches!(result, Err(CaptureError::NoSpeechDetected)));
}

#[test]
fn manual_stop_before_any_frame_is_empty_capture() {
    let mut source = ScriptedSource::new(SAMPLE_RATE, Vec::new());
    let (handle, token) = stop_channel();
    handle.stop();

    let config = SessionConfig::default();
    let result = RecordingSession::start(&mut source, &config, Some(token));
    assert!(matches!(result, Err(CaptureError::EmptyCapture)));
}

#[test]
fn manual_stop_returns_the_partial_capture() {
    let frames = vec![silence_frame(); 5];
    let (handle, token) = stop_channel();
    let mut source = ScriptedSource::new(SAMPLE_RATE, frames);
    source.stop_when_drained = Some(handle);

    let config = SessionConfig::default();
    let audio = RecordingSession::start(&mut source, &config, Some(token)).unwrap();
    assert_eq!(audio.samples.len(), 5 * FRAME_SIZE);
}

#[test]
fn session_rejects_source_rate_mismatch_before_reading() {
    let mut source = ScriptedSource::new(8_000, vec![silence_frame()]);
    let config = SessionConfig::default();
    let result = RecordingSession::start(&mut source, &config, None);
    assert!(matches!(result, Err(CaptureError::Config(_))));
    // The mismatch is caught before any frame is consumed.
    assert_eq!(source.frames.len(), 1);
}

#[test]
fn closed_source_with_frames_ends_as_best_effort_capture() {
    let mut source = ScriptedSource::new(SAMPLE_RATE, vec![silence_frame(); 4]);
    source.after = AfterScript::Closed;

    let config = SessionConfig::default();
    let audio = RecordingSession::start(&mut source, &config, None).unwrap();
    assert_eq!(audio.samples.len(), 4 * FRAME_SIZE);
}

#[test]
fn closed_source_with_nothing_captured_is_an_io_error() {
    let mut source = ScriptedSource::new(SAMPLE_RATE, Vec::new());
    source.after = AfterScript::Closed;

    let config = SessionConfig::default();
    let result = RecordingSession::start(&mut source, &config, None);
    assert!(matches!(result, Err(CaptureError::CaptureIo(_))));
}

#[test]
fn phrase_limit_caps_continuous_speech() {
    let frames = vec![sine_frame(250.0, 8_000.0); 40];
    let mut source = ScriptedSource::new(SAMPLE_RATE, frames);
    let mut config = SessionConfig::default();
    config.max_capture = Some(Duration::from_millis(500));

    let audio = RecordingSession::start(&mut source, &config, None).unwrap();
    assert!(audio.samples.len() >= 8 * FRAME_SIZE);
    assert!(audio.samples.len() <= 12 * FRAME_SIZE);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = SessionConfig::default();
    config.frame_size = 1_000;
    assert!(config.validate().is_err());

    config = SessionConfig::default();
    config.spectral_floor_factor = 0.5;
    config.spectral_gate_factor = 0.3;
    assert!(config.validate().is_err());

    config = SessionConfig::default();
    config.voice_band_hz = (85.0, 12_000.0);
    assert!(config.validate().is_err());

    assert!(SessionConfig::default().validate().is_ok());
}

// ---- wav ------------------------------------------------------------------

#[test]
fn wav_bytes_carry_a_riff_header() {
    let audio = super::CapturedAudio {
        samples: vec![0i16; 160],
        sample_rate: SAMPLE_RATE,
        channels: 1,
    };
    let bytes = wav::to_wav_bytes(&audio).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(bytes.len(), 44 + 160 * 2);
}
