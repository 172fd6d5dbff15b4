//! Spectral-subtraction noise suppression.
//!
//! A noise profile is accumulated from the magnitude spectra of the first N
//! frames of a session and frozen afterwards. Every frame (including the
//! profile frames themselves, which see a partially built profile) has the
//! scaled profile subtracted from its magnitude spectrum, floored so a bin is
//! never driven below a fraction of its own magnitude. Bins outside the voice
//! band are zeroed, then the frame is rebuilt from the filtered magnitude and
//! the original phase.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// A frame after noise suppression, with the spectrum the suppression left
/// behind so voice-activity scoring does not need a second transform.
pub struct FilteredFrame {
    /// Time-domain samples reconstructed from the filtered spectrum.
    pub samples: Vec<i16>,
    /// Filtered magnitude spectrum, bins `0..=frame_size / 2`.
    pub spectrum: Vec<f32>,
    /// Width of one FFT bin in Hz.
    pub bin_hz: f32,
}

impl FilteredFrame {
    /// Total spectral energy (sum of squared magnitudes over the frame size)
    /// inside `band` Hz.
    pub fn band_energy(&self, band: (f32, f32)) -> f32 {
        let lo = (band.0 / self.bin_hz) as usize;
        let hi = ((band.1 / self.bin_hz) as usize).min(self.spectrum.len().saturating_sub(1));
        let n = (self.spectrum.len().saturating_sub(1) * 2).max(1) as f32;
        self.spectrum[lo..=hi].iter().map(|m| m * m).sum::<f32>() / n
    }
}

/// Per-session noise-profile state plus the FFT plan shared by every frame.
pub struct SpectralDenoiser {
    frame_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    profile_sum: Vec<f32>,
    profile_frames: usize,
    profile_target: usize,
    gate_factor: f32,
    floor_factor: f32,
    band_lo: usize,
    band_hi: usize,
    bin_hz: f32,
    scratch: Vec<Complex<f32>>,
}

impl SpectralDenoiser {
    pub fn new(
        sample_rate: u32,
        frame_size: usize,
        voice_band_hz: (f32, f32),
        profile_frames: usize,
        gate_factor: f32,
        floor_factor: f32,
    ) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(frame_size);
        let inverse = planner.plan_fft_inverse(frame_size);
        let bin_hz = sample_rate as f32 / frame_size as f32;
        let half = frame_size / 2;
        let band_lo = (voice_band_hz.0 / bin_hz) as usize;
        let band_hi = ((voice_band_hz.1 / bin_hz) as usize).min(half);

        Self {
            frame_size,
            forward,
            inverse,
            profile_sum: vec![0.0; half + 1],
            profile_frames: 0,
            profile_target: profile_frames,
            gate_factor,
            floor_factor,
            band_lo,
            band_hi,
            bin_hz,
            scratch: vec![Complex::new(0.0, 0.0); frame_size],
        }
    }

    /// Number of frames that have contributed to the noise profile so far.
    pub fn profile_frames_seen(&self) -> usize {
        self.profile_frames
    }

    /// Suppress noise in one frame and return the filtered result.
    ///
    /// Short final frames are zero-padded to the FFT size; the output keeps
    /// the input length.
    pub fn process(&mut self, samples: &[i16]) -> FilteredFrame {
        let len = samples.len().min(self.frame_size);
        for (slot, sample) in self.scratch.iter_mut().zip(samples.iter()) {
            *slot = Complex::new(*sample as f32, 0.0);
        }
        for slot in self.scratch.iter_mut().skip(len) {
            *slot = Complex::new(0.0, 0.0);
        }

        self.forward.process(&mut self.scratch);

        let half = self.frame_size / 2;
        let mut magnitudes: Vec<f32> = (0..=half).map(|k| self.scratch[k].norm()).collect();

        // Profile accumulation runs first, so the profile frames are
        // suppressed against a partial average that includes themselves.
        if self.profile_frames < self.profile_target {
            for (sum, mag) in self.profile_sum.iter_mut().zip(magnitudes.iter()) {
                *sum += mag;
            }
            self.profile_frames += 1;
        }

        let profile_count = self.profile_frames.max(1) as f32;
        for (k, mag) in magnitudes.iter_mut().enumerate() {
            let filtered = if k < self.band_lo || k > self.band_hi {
                0.0
            } else {
                let estimate = self.gate_factor * (self.profile_sum[k] / profile_count);
                (*mag - estimate).max(self.floor_factor * *mag)
            };
            let gain = if *mag > f32::EPSILON {
                filtered / *mag
            } else {
                0.0
            };
            // Real gain on bin k and its mirror keeps the spectrum
            // conjugate-symmetric, so the inverse transform stays real.
            self.scratch[k] *= gain;
            if k != 0 && k != half {
                self.scratch[self.frame_size - k] *= gain;
            }
            *mag = filtered;
        }

        self.inverse.process(&mut self.scratch);

        let scale = 1.0 / self.frame_size as f32;
        let samples_out: Vec<i16> = self.scratch[..len]
            .iter()
            .map(|c| (c.re * scale).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        FilteredFrame {
            samples: samples_out,
            spectrum: magnitudes,
            bin_hz: self.bin_hz,
        }
    }
}
