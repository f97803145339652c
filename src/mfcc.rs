//! Streaming MFCC feature extraction (SPEC_FULL.md §4.2).
//!
//! The FFT call shape — plan once, reuse `make_output_vec`/`process` per
//! frame — mirrors `realfft::RealFftPlanner`'s intended usage for windowed,
//! frame-at-a-time spectral processing: precompute the plan once, touch only
//! scratch arrays in the hot loop. Everything past the FFT (mel filterbank,
//! DCT-II, liftering) is built fresh on top of that.

use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

pub const NUM_CEPSTRAL_COEFFS: usize = 13;
const LOG_FLOOR: f32 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MfccConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    pub num_filters: usize,
    pub sample_rate: f32,
    pub lifter_coeff: Option<u32>,
    pub use_energy: bool,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            frame_size: 512,
            hop_size: 256,
            num_filters: 26,
            sample_rate: 16_000.0,
            lifter_coeff: Some(22),
            use_energy: false,
        }
    }
}

/// Precomputes the Hann window, mel filterbank, and DCT-II basis once and
/// reuses them across every frame pushed through [`MfccExtractor::process_frame`].
pub struct MfccExtractor {
    config: MfccConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    filterbank: Vec<Vec<f32>>,
    dct_basis: Vec<Vec<f32>>,
    scratch_in: Vec<f32>,
    scratch_out: Vec<Complex32>,
}

impl MfccExtractor {
    pub fn new(config: MfccConfig) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.frame_size);
        let window = hann_window(config.frame_size);
        let filterbank = mel_filterbank(
            config.num_filters,
            config.frame_size,
            config.sample_rate,
        );
        let dct_basis = dct2_basis(config.num_filters, NUM_CEPSTRAL_COEFFS);
        let scratch_in = fft.make_input_vec();
        let scratch_out = fft.make_output_vec();
        Self {
            config,
            fft,
            window,
            filterbank,
            dct_basis,
            scratch_in,
            scratch_out,
        }
    }

    pub fn config(&self) -> &MfccConfig {
        &self.config
    }

    /// Computes one `NUM_CEPSTRAL_COEFFS`-wide feature vector from a single
    /// time-domain frame. Returns `None` if the result would contain a
    /// non-finite value (silence frames legally floor to a constant, never NaN).
    pub fn process_frame(&mut self, frame: &[f32]) -> Option<[f32; NUM_CEPSTRAL_COEFFS]> {
        debug_assert_eq!(frame.len(), self.config.frame_size);

        let frame_energy: f32 = frame.iter().map(|s| s * s).sum::<f32>().max(LOG_FLOOR);

        for (i, sample) in frame.iter().enumerate() {
            self.scratch_in[i] = sample * self.window[i];
        }

        self.fft
            .process(&mut self.scratch_in, &mut self.scratch_out)
            .ok()?;

        let power_spectrum: Vec<f32> = self
            .scratch_out
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im) / self.config.frame_size as f32)
            .collect();

        let mut log_mel = vec![0.0f32; self.config.num_filters];
        for (m, filt) in self.filterbank.iter().enumerate() {
            let energy: f32 = filt
                .iter()
                .zip(power_spectrum.iter())
                .map(|(w, p)| w * p)
                .sum();
            log_mel[m] = energy.max(LOG_FLOOR).ln();
        }

        let mut coeffs = [0.0f32; NUM_CEPSTRAL_COEFFS];
        for (k, basis_row) in self.dct_basis.iter().enumerate() {
            coeffs[k] = basis_row
                .iter()
                .zip(log_mel.iter())
                .map(|(b, lm)| b * lm)
                .sum();
        }

        if let Some(l) = self.config.lifter_coeff {
            apply_lifter(&mut coeffs, l);
        }

        if self.config.use_energy {
            coeffs[0] = frame_energy.ln();
        }

        if coeffs.iter().any(|c| !c.is_finite()) {
            return None;
        }
        Some(coeffs)
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / (size as f32 - 1.0)).cos())
        .collect()
}

/// Triangular mel filterbank, one weight vector per filter, each as wide as
/// the FFT's real-spectrum output (`frame_size / 2 + 1`).
fn mel_filterbank(num_filters: usize, frame_size: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let num_bins = frame_size / 2 + 1;
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sample_rate / 2.0);
    let mel_points: Vec<f32> = (0..num_filters + 2)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (num_filters + 1) as f32)
        .collect();
    let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();
    let bin_points: Vec<usize> = hz_points
        .iter()
        .map(|&hz| ((frame_size as f32 + 1.0) * hz / sample_rate).floor() as usize)
        .collect();

    let mut filters = vec![vec![0.0f32; num_bins]; num_filters];
    for m in 1..=num_filters {
        let (left, center, right) = (bin_points[m - 1], bin_points[m], bin_points[m + 1]);
        for bin in left..center {
            if center > left && bin < num_bins {
                filters[m - 1][bin] = (bin - left) as f32 / (center - left) as f32;
            }
        }
        for bin in center..right {
            if right > center && bin < num_bins {
                filters[m - 1][bin] = (right - bin) as f32 / (right - center) as f32;
            }
        }
    }
    filters
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Orthonormal-ish DCT-II basis, `num_coeffs` rows of length `num_filters`,
/// matching the standard MFCC convention (coefficient 0 retains log-energy
/// unless overridden by [`MfccConfig::use_energy`]).
fn dct2_basis(num_filters: usize, num_coeffs: usize) -> Vec<Vec<f32>> {
    (0..num_coeffs)
        .map(|k| {
            (0..num_filters)
                .map(|n| {
                    (PI / num_filters as f32 * (n as f32 + 0.5) * k as f32).cos()
                        * if k == 0 {
                            (1.0 / num_filters as f32).sqrt()
                        } else {
                            (2.0 / num_filters as f32).sqrt()
                        }
                })
                .collect()
        })
        .collect()
}

fn apply_lifter(coeffs: &mut [f32; NUM_CEPSTRAL_COEFFS], lifter: u32) {
    let l = lifter as f32;
    for (n, c) in coeffs.iter_mut().enumerate() {
        let w = 1.0 + (l / 2.0) * (PI * n as f32 / l).sin();
        *c *= w;
    }
}
