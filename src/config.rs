//! Configuration objects enumerated in SPEC_FULL.md §6, all `serde`-derived
//! with `#[serde(default)]` so a host can load a partial override and fall
//! back to the documented defaults for the rest (§10.3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub energy_threshold: f32,
    pub window_duration_s: f32,
    pub min_sound_duration_s: f32,
    pub pre_buffer_s: f32,
    pub post_buffer_s: f32,
    pub enabled: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            window_duration_s: 0.025,
            min_sound_duration_s: 0.1,
            pre_buffer_s: 0.1,
            post_buffer_s: 0.2,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtwConfig {
    pub window_ratio: f32,
    pub enable_simd: bool,
}

impl Default for DtwConfig {
    fn default() -> Self {
        Self {
            window_ratio: 0.1,
            enable_simd: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorWeights {
    pub offset: f32,
    pub dtw: f32,
    pub mean: f32,
    pub subsequence: f32,
}

impl Default for AggregatorWeights {
    fn default() -> Self {
        Self {
            offset: 0.15,
            dtw: 0.50,
            mean: 0.15,
            subsequence: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub weights: AggregatorWeights,
    pub min_frames_required: usize,
    pub min_score_for_match: f32,
    pub confidence_threshold: f32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            weights: AggregatorWeights::default(),
            min_frames_required: 32,
            min_score_for_match: 0.005,
            confidence_threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyMap {
    Linear,
    Sqrt,
}

impl Default for EnergyMap {
    fn default() -> Self {
        EnergyMap::Linear
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub max_points: usize,
    pub user_decimation_override: Option<usize>,
    pub energy_map: EnergyMap,
    pub prefer_energy_approx: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_points: 512,
            user_decimation_override: None,
            energy_map: EnergyMap::Linear,
            prefer_energy_approx: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    pub fallback_threshold: f32,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.40,
        }
    }
}

/// Resolves where `MasterFeatureStore` reads `.mfc` files from, and how many
/// reference matrices it memoizes at once. The data directory resolves via
/// `dirs` with a relative fallback if no platform data directory is
/// available, see SPEC_FULL.md §10.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterStoreConfig {
    pub root: std::path::PathBuf,
    pub cache_cap: usize,
}

impl Default for MasterStoreConfig {
    fn default() -> Self {
        Self {
            root: default_master_root(),
            cache_cap: 16,
        }
    }
}

fn default_master_root() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|d| d.join("mastercall").join("master_calls"))
        .unwrap_or_else(|| std::path::PathBuf::from("./master_calls"))
}
