//! Deterministic coaching feedback (SPEC_FULL.md §4.9).
//!
//! A small ordered rule engine over grades and loudness deviation: walk fixed
//! thresholds in a set order and push a message for each one that fires,
//! producing user-facing suggestions rather than a single pass/fail verdict.

use crate::enhanced::{EnhancedSummary, Grade};
use serde::Serialize;

pub const MAX_SUGGESTIONS: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct CoachingFeedback {
    pub suggestions: Vec<String>,
}

/// Evaluates the fixed, ordered rule list from §4.9 against the latest
/// enhanced summary and loudness deviation. Every rule that matches appends
/// exactly one suggestion; the result is capped at [`MAX_SUGGESTIONS`]
/// entries (the rule list has six rules, so the cap never actually trims).
pub fn build_feedback(enhanced: &EnhancedSummary, loudness_deviation: f32) -> CoachingFeedback {
    let mut suggestions = Vec::with_capacity(MAX_SUGGESTIONS);

    if enhanced.pitch_grade >= Grade::B
        && enhanced.harmonic_grade >= Grade::B
        && enhanced.cadence_grade >= Grade::B
    {
        suggestions.push("Solid match — keep it up.".to_string());
    }
    if enhanced.pitch_grade <= Grade::D {
        suggestions.push("Work on pitch contour.".to_string());
    }
    if enhanced.harmonic_grade <= Grade::D {
        suggestions.push("Adjust tone / harmonics.".to_string());
    }
    if enhanced.cadence_grade <= Grade::D {
        suggestions.push("Tighten timing / rhythm.".to_string());
    }
    if loudness_deviation < -0.15 {
        suggestions.push("Increase volume.".to_string());
    }
    if loudness_deviation > 0.25 {
        suggestions.push("Reduce volume.".to_string());
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    CoachingFeedback { suggestions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhanced::Grade;

    fn summary(pitch: Grade, harmonic: Grade, cadence: Grade) -> EnhancedSummary {
        EnhancedSummary {
            valid: true,
            pitch_confidence: 0.0,
            pitch_grade: pitch,
            harmonic_confidence: 0.0,
            harmonic_grade: harmonic,
            cadence_confidence: 0.0,
            cadence_grade: cadence,
            computed_at_s: 0.0,
        }
    }

    #[test]
    fn never_exceeds_max_suggestions() {
        let fb = build_feedback(&summary(Grade::F, Grade::F, Grade::F), -0.9);
        assert!(fb.suggestions.len() <= MAX_SUGGESTIONS);
    }

    #[test]
    fn all_high_grades_yield_solid_match_only() {
        let fb = build_feedback(&summary(Grade::A, Grade::A, Grade::A), 0.0);
        assert_eq!(fb.suggestions, vec!["Solid match — keep it up.".to_string()]);
    }

    #[test]
    fn low_grades_trigger_per_component_suggestions() {
        let fb = build_feedback(&summary(Grade::D, Grade::E, Grade::F), 0.0);
        assert_eq!(fb.suggestions.len(), 3);
        assert!(fb.suggestions[0].contains("pitch"));
        assert!(fb.suggestions[1].contains("tone"));
        assert!(fb.suggestions[2].contains("timing"));
    }

    #[test]
    fn loudness_rules_are_order_sensitive_and_mutually_exclusive_in_practice() {
        let quiet = build_feedback(&summary(Grade::A, Grade::A, Grade::A), -0.3);
        assert!(quiet.suggestions.iter().any(|s| s.contains("Increase volume")));
        let loud = build_feedback(&summary(Grade::A, Grade::A, Grade::A), 0.3);
        assert!(loud.suggestions.iter().any(|s| s.contains("Reduce volume")));
    }

    #[test]
    fn json_serialization_matches_documented_shape() {
        let fb = build_feedback(&summary(Grade::A, Grade::A, Grade::A), 0.0);
        let json = serde_json::to_value(&fb).unwrap();
        assert!(json.get("suggestions").is_some());
    }
}
