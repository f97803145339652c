//! Enhanced similarity summary: per-component letter grades and staleness
//! gating (SPEC_FULL.md §4.10).
//!
//! Computing confidences for pitch/harmonic/cadence components is expensive
//! relative to the lightweight per-chunk DTW update, so the summary is only
//! refreshed on demand and reused until it goes stale, rather than
//! recomputed on every processed frame.

use crate::clock::Clock;
use std::sync::Arc;

/// How long a computed enhanced summary remains valid before a fresh query
/// forces recomputation.
pub const STALENESS_WINDOW_S: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    F,
    E,
    D,
    C,
    B,
    A,
}

pub fn grade(value: f32) -> Grade {
    if value >= 0.85 {
        Grade::A
    } else if value >= 0.70 {
        Grade::B
    } else if value >= 0.55 {
        Grade::C
    } else if value >= 0.40 {
        Grade::D
    } else if value >= 0.25 {
        Grade::E
    } else {
        Grade::F
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedConfidences {
    pub pitch: f32,
    pub harmonic: f32,
    pub cadence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedSummary {
    pub valid: bool,
    pub pitch_confidence: f32,
    pub pitch_grade: Grade,
    pub harmonic_confidence: f32,
    pub harmonic_grade: Grade,
    pub cadence_confidence: f32,
    pub cadence_grade: Grade,
    pub computed_at_s: f64,
}

/// Lazily computes and caches [`EnhancedSummary`]. Disabled until the first
/// query on a session, which both enables analysis and forces a compute
/// regardless of staleness; subsequent queries reuse the cached summary
/// until [`STALENESS_WINDOW_S`] elapses. Disabling and re-enabling discards
/// whatever was cached, per §4.10.
pub struct EnhancedAnalyzer {
    clock: Arc<dyn Clock>,
    enabled: bool,
    cached: Option<EnhancedSummary>,
    /// Direct confidence override installed by the `test-hooks` injection
    /// path, bypassing whatever the analyzer would otherwise compute.
    injected: Option<EnhancedConfidences>,
}

impl EnhancedAnalyzer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            enabled: false,
            cached: None,
            injected: None,
        }
    }

    pub fn reset(&mut self) {
        self.enabled = false;
        self.cached = None;
        self.injected = None;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.cached = None;
        }
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "test-hooks")]
    pub fn inject_confidences(&mut self, confidences: EnhancedConfidences) {
        self.injected = Some(confidences);
    }

    /// Returns the current summary, auto-enabling on first call and
    /// recomputing whenever nothing is cached or the cached value has gone
    /// stale. `frames_available` gates validity per §4.10(c).
    pub fn query(
        &mut self,
        frames_available: bool,
        compute: impl FnOnce() -> EnhancedConfidences,
    ) -> EnhancedSummary {
        self.enabled = true;
        let now = self.clock.now_s();
        let stale = self
            .cached
            .map(|s| now - s.computed_at_s > STALENESS_WINDOW_S)
            .unwrap_or(true);

        if stale {
            let confidences = self.injected.unwrap_or_else(compute);
            let summary = EnhancedSummary {
                valid: self.enabled && frames_available,
                pitch_confidence: confidences.pitch,
                pitch_grade: grade(confidences.pitch),
                harmonic_confidence: confidences.harmonic,
                harmonic_grade: grade(confidences.harmonic),
                cadence_confidence: confidences.cadence,
                cadence_grade: grade(confidences.cadence),
                computed_at_s: now,
            };
            self.cached = Some(summary);
        }
        let mut summary = self.cached.unwrap();
        summary.valid = self.enabled && frames_available;
        summary
    }
}
