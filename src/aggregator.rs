//! Multi-component similarity aggregation (SPEC_FULL.md §4.6).
//!
//! Combines the DTW matcher's several outputs (offset, full-path, running
//! mean, subsequence) into one headline score, weighting and renormalizing
//! over whichever components are currently valid: collect components, skip
//! the invalid ones, renormalize the remaining weights so they still sum to
//! one.

use crate::config::AggregatorConfig;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityComponents {
    pub offset: Option<f32>,
    pub dtw: Option<f32>,
    pub mean: Option<f32>,
    pub subsequence: Option<f32>,
}

impl SimilarityComponents {
    fn any_valid(&self) -> bool {
        self.offset.is_some() || self.dtw.is_some() || self.mean.is_some() || self.subsequence.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedScore {
    pub overall: f32,
    pub offset: f32,
    pub dtw: f32,
    pub mean: f32,
    pub subsequence: f32,
    pub is_reliable: bool,
    pub is_match: bool,
}

/// Sentinel published for a component that was not valid this call (§4.6:
/// "each the raw component or a sentinel < 0 if invalid").
const INVALID_COMPONENT: f32 = -1.0;

pub struct SimilarityAggregator {
    config: AggregatorConfig,
    peak: f32,
    frames_seen: usize,
}

impl SimilarityAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            peak: 0.0,
            frames_seen: 0,
        }
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
        self.frames_seen = 0;
    }

    pub fn note_frame(&mut self) {
        self.frames_seen += 1;
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn min_frames_required(&self) -> usize {
        self.config.min_frames_required
    }

    /// Weighted-sums whichever components are present, renormalizing the
    /// configured weights over just the valid subset. Fails with
    /// `INSUFFICIENT_DATA` if every component is invalid (§4.6).
    pub fn aggregate(
        &mut self,
        components: SimilarityComponents,
    ) -> Result<AggregatedScore, EngineError> {
        if !components.any_valid() {
            return Err(EngineError::InsufficientData(
                "no similarity component has enough frames yet",
            ));
        }

        let weights = self.config.weights;
        let pairs: [(Option<f32>, f32); 4] = [
            (components.offset, weights.offset),
            (components.dtw, weights.dtw),
            (components.mean, weights.mean),
            (components.subsequence, weights.subsequence),
        ];

        let total_weight: f32 = pairs.iter().filter_map(|(v, w)| v.map(|_| *w)).sum();
        let overall = if total_weight > 0.0 {
            pairs
                .iter()
                .filter_map(|(v, w)| v.map(|val| val * w))
                .sum::<f32>()
                / total_weight
        } else {
            0.0
        };
        let overall = if overall.is_finite() { overall } else { 0.0 };

        if overall > self.peak {
            self.peak = overall;
        }

        let is_reliable = self.frames_seen >= self.config.min_frames_required;
        let is_match = overall >= self.config.min_score_for_match;

        Ok(AggregatedScore {
            overall,
            offset: components.offset.unwrap_or(INVALID_COMPONENT),
            dtw: components.dtw.unwrap_or(INVALID_COMPONENT),
            mean: components.mean.unwrap_or(INVALID_COMPONENT),
            subsequence: components.subsequence.unwrap_or(INVALID_COMPONENT),
            is_reliable,
            is_match,
        })
    }
}
