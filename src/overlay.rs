//! Waveform overlay decimation for UI display (SPEC_FULL.md §4.11).
//!
//! Peak-bucket decimation generalizes a running-peak fold
//! (`fold(0.0, f32::max)` over a chunk) from a single scalar to one peak per
//! output bucket, so a whole recording can be drawn in a fixed number of
//! points. The master side is resampled to match, since the core never holds
//! the master's raw audio (out of scope — §1) and instead falls back to
//! per-frame feature energies.

use crate::config::{EnergyMap, OverlayConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformOverlay {
    pub user_peaks: Vec<f32>,
    pub master_peaks: Vec<f32>,
    pub decimation: usize,
    pub valid: bool,
}

fn apply_energy_map(v: f32, map: EnergyMap) -> f32 {
    match map {
        EnergyMap::Linear => v,
        EnergyMap::Sqrt => v.sqrt(),
    }
}

/// Buckets `values` into exactly `target_points` peak-magnitude samples
/// (fewer only if `values` itself is shorter).
fn decimate_to(values: &[f32], target_points: usize, map: EnergyMap) -> Vec<f32> {
    if values.is_empty() || target_points == 0 {
        return Vec::new();
    }
    let target_points = target_points.min(values.len()).max(1);
    let bucket_size = ((values.len() as f32 / target_points as f32).ceil() as usize).max(1);
    values
        .chunks(bucket_size)
        .map(|chunk| {
            let peak = chunk.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
            apply_energy_map(peak, map).clamp(0.0, 1.0)
        })
        .collect()
}

/// Decimates the user's raw sample history and the master's per-frame
/// energies (or raw audio peaks, if a host ever supplies them) to the same
/// point count, per §4.11's algorithm.
pub fn compute(user_samples: &[f32], master_energies: &[f32], config: &OverlayConfig) -> WaveformOverlay {
    if user_samples.is_empty() || master_energies.is_empty() {
        return WaveformOverlay {
            user_peaks: Vec::new(),
            master_peaks: Vec::new(),
            decimation: 0,
            valid: false,
        };
    }

    let target_points = config
        .user_decimation_override
        .map(|d| (user_samples.len() / d.max(1)).max(1))
        .unwrap_or(config.max_points)
        .min(user_samples.len())
        .max(1);

    let decimation = ((user_samples.len() as f32 / target_points as f32).ceil() as usize).max(1);

    let user_peaks = decimate_to(user_samples, target_points, config.energy_map);
    let master_peaks = decimate_to(master_energies, user_peaks.len(), config.energy_map);

    WaveformOverlay {
        valid: !user_peaks.is_empty() && !master_peaks.is_empty(),
        user_peaks,
        master_peaks,
        decimation,
    }
}
