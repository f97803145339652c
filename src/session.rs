//! Session: composes every other component behind one state machine
//! (SPEC_FULL.md §3, §4.12). Every piece of mutable state for one grading
//! attempt lives here, scoped to a single recording, and the `Engine`
//! (§4.13) never reaches past this boundary.

use crate::aggregator::{AggregatedScore, SimilarityAggregator, SimilarityComponents};
use crate::clock::Clock;
use crate::coaching::{self, CoachingFeedback};
use crate::config::{AggregatorConfig, DtwConfig, FinalizeConfig, OverlayConfig, VadConfig};
use crate::distance::{cosine_similarity_unit, mean_vector};
use crate::dtw::DtwMatcher;
use crate::enhanced::{EnhancedAnalyzer, EnhancedConfidences, EnhancedSummary, Grade};
use crate::error::EngineError;
use crate::loudness::{self, LoudnessTracker};
use crate::master_store::MasterEntry;
use crate::mfcc::{MfccConfig, MfccExtractor, NUM_CEPSTRAL_COEFFS};
use crate::overlay::{self, WaveformOverlay};
use crate::ring_buffer::RingBuffer;
use crate::vad::{Vad, VadState};
use ndarray::Array2;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Number of leading frames compared for the "offset" component (§4.6).
const OFFSET_FRAMES: usize = 8;
/// Minimum frames before the "mean" component is considered valid (§4.6).
const MEAN_MIN_FRAMES: usize = 4;
/// How long raw samples are retained for waveform overlay / export, in
/// seconds. Not part of the documented config surface (§6 doesn't enumerate
/// a "RecordingConfig"); kept as a fixed constant and logged in DESIGN.md as
/// an additive, undocumented-by-spec default.
const RECORDING_CAP_SECONDS: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Active,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealtimeState {
    pub frames_observed: usize,
    pub min_frames_required: usize,
    pub reliable: bool,
    pub last_similarity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalizeOutcome {
    pub similarity_at_finalize: f32,
    pub finalize_fallback_used: bool,
    pub segment_duration_ms: u64,
}

/// Full `get_enhanced_analysis_summary` response (SPEC_FULL.md §6): the
/// lazily-cached per-component confidences/grades plus the session-level
/// fields the external-interfaces table requires alongside them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancedAnalysisSummary {
    pub valid: bool,
    pub pitch_confidence: f32,
    pub pitch_grade: Grade,
    pub harmonic_confidence: f32,
    pub harmonic_grade: Grade,
    pub cadence_confidence: f32,
    pub cadence_grade: Grade,
    pub computed_at_s: f64,
    pub similarity_at_finalize: Option<f32>,
    pub normalization_scalar: f32,
    pub loudness_deviation: f32,
    pub finalized: bool,
    pub segment_duration_ms: u64,
}

pub struct Session {
    id: u32,
    sample_rate: f32,
    created_at_s: f64,
    last_activity_s: f64,
    clock: Arc<dyn Clock>,

    state: SessionState,

    master_call_id: Option<String>,
    master_features: Option<MasterEntry>,
    master_mean: Option<[f32; NUM_CEPSTRAL_COEFFS]>,

    session_features: Vec<[f32; NUM_CEPSTRAL_COEFFS]>,
    ring: RingBuffer,
    mfcc: MfccExtractor,
    frame_duration_s: f32,

    vad: Vad,
    vad_config: VadConfig,
    /// Rolling history of computed features for frames the VAD currently
    /// classifies as silence, bounded to `pre_buffer_cap`; replayed into
    /// `session_features` if the next frames are confirmed as a speech onset.
    pre_buffer: VecDeque<[f32; NUM_CEPSTRAL_COEFFS]>,
    /// Computed features for the current unconfirmed `CANDIDATE` run,
    /// committed on confirmation or discarded if the run drops back to
    /// silence before `min_sound_duration_s` is reached.
    pending_candidate: Vec<[f32; NUM_CEPSTRAL_COEFFS]>,

    recording: Vec<f32>,
    recording_cap: usize,

    dtw_window_ratio: f32,
    dtw: DtwMatcher,

    loudness: LoudnessTracker,

    aggregator: SimilarityAggregator,
    last_score: Option<AggregatedScore>,

    enhanced: EnhancedAnalyzer,

    finalize_config: FinalizeConfig,
    finalized: bool,
    finalize_fallback_used: bool,
    segment_duration_ms: u64,
    similarity_at_finalize: Option<f32>,
}

impl Session {
    pub fn new(id: u32, sample_rate: f32, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        if !(sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        let mfcc_config = MfccConfig {
            sample_rate,
            ..MfccConfig::default()
        };
        let frame_duration_s = mfcc_config.hop_size as f32 / sample_rate;
        let vad_config = VadConfig::default();
        let dtw_window_ratio = DtwConfig::default().window_ratio;
        let now = clock.now_s();

        Ok(Self {
            id,
            sample_rate,
            created_at_s: now,
            last_activity_s: now,
            clock: clock.clone(),
            state: SessionState::Ready,
            master_call_id: None,
            master_features: None,
            master_mean: None,
            session_features: Vec::new(),
            ring: RingBuffer::new(mfcc_config.frame_size, mfcc_config.hop_size),
            mfcc: MfccExtractor::new(mfcc_config),
            frame_duration_s,
            vad: Vad::new(vad_config, frame_duration_s),
            vad_config,
            pre_buffer: VecDeque::new(),
            pending_candidate: Vec::new(),
            recording: Vec::new(),
            recording_cap: (sample_rate * RECORDING_CAP_SECONDS) as usize,
            dtw_window_ratio,
            dtw: DtwMatcher::new(dtw_window_ratio),
            loudness: LoudnessTracker::new(),
            aggregator: SimilarityAggregator::new(AggregatorConfig::default()),
            last_score: None,
            enhanced: EnhancedAnalyzer::new(clock),
            finalize_config: FinalizeConfig::default(),
            finalized: false,
            finalize_fallback_used: false,
            segment_duration_ms: 0,
            similarity_at_finalize: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn duration_s(&self) -> f64 {
        self.last_activity_s - self.created_at_s
    }

    #[instrument(skip(self, store), fields(session_id = self.id, call_id = %call_id))]
    pub fn load_master_call(
        &mut self,
        store: &crate::master_store::MasterFeatureStore,
        call_id: &str,
    ) -> Result<(), EngineError> {
        let entry = store.load(call_id)?;
        self.master_mean = Some(mean_vector(&frames_to_vec(&entry.frames)));
        self.master_features = Some(entry);
        self.master_call_id = Some(call_id.to_string());
        self.aggregator.reset();
        self.last_score = None;
        info!("master call loaded");
        Ok(())
    }

    pub fn unload_master_call(&mut self) {
        self.master_features = None;
        self.master_call_id = None;
        self.master_mean = None;
        self.aggregator.reset();
        self.last_score = None;
    }

    #[instrument(skip(self, samples), fields(session_id = self.id, n = samples.len()))]
    pub fn process_audio_chunk(&mut self, samples: &[f32]) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::AlreadyFinalized);
        }
        if samples.is_empty() {
            return Err(EngineError::EmptyChunk);
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(EngineError::NonFiniteSample);
        }

        self.state = SessionState::Active;
        self.loudness.push_samples(samples);
        self.push_recording(samples);
        self.ring.push_slice(samples);

        while let Some(frame) = self.ring.drain_frame() {
            let frame = frame.to_vec();
            self.consume_frame(&frame);
        }

        self.last_activity_s = self.clock.now_s();

        if self.master_features.is_some() {
            self.recompute_score();
        }
        debug!(feature_count = self.session_features.len(), "chunk processed");
        Ok(())
    }

    /// Runs one frame through VAD and MFCC extraction. Frames in an
    /// unconfirmed `CANDIDATE` run, and the rolling `pre_buffer_s` of silence
    /// immediately preceding it, are held back rather than committed — once
    /// the run is confirmed `ACTIVE` both are replayed into
    /// `session_features` in order, so a genuine speech onset doesn't lose
    /// its leading transient; if the run instead drops back to silence, the
    /// held candidate frames are discarded (§4.3).
    fn consume_frame(&mut self, frame: &[f32]) {
        let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
        let rms = (sum_sq / frame.len().max(1) as f32).sqrt();
        let prev_state = self.vad.state();
        let vad_result = self.vad.process_energy(rms);
        let coeffs = self.mfcc.process_frame(frame);

        match vad_result.state {
            VadState::Silence => {
                self.pending_candidate.clear();
                if let Some(c) = coeffs {
                    self.push_pre_buffer(c);
                }
            }
            VadState::Candidate => {
                if let Some(c) = coeffs {
                    self.pending_candidate.push(c);
                }
            }
            VadState::Active if prev_state == VadState::Candidate => {
                for c in self.pre_buffer.drain(..).collect::<Vec<_>>() {
                    self.commit_feature(c);
                }
                for c in std::mem::take(&mut self.pending_candidate) {
                    self.commit_feature(c);
                }
                if let Some(c) = coeffs {
                    self.commit_feature(c);
                }
            }
            VadState::Active | VadState::Trailing => {
                if let Some(c) = coeffs {
                    self.commit_feature(c);
                }
            }
        }
    }

    fn commit_feature(&mut self, coeffs: [f32; NUM_CEPSTRAL_COEFFS]) {
        self.session_features.push(coeffs);
        self.aggregator.note_frame();
    }

    fn push_pre_buffer(&mut self, coeffs: [f32; NUM_CEPSTRAL_COEFFS]) {
        if self.pre_buffer.len() == self.vad.pre_buffer_cap().max(1) {
            self.pre_buffer.pop_front();
        }
        self.pre_buffer.push_back(coeffs);
    }

    fn push_recording(&mut self, samples: &[f32]) {
        self.recording.extend_from_slice(samples);
        if self.recording.len() > self.recording_cap {
            let overflow = self.recording.len() - self.recording_cap;
            self.recording.drain(0..overflow);
        }
    }

    fn recompute_score(&mut self) {
        let Some(master) = self.master_features.as_ref() else {
            return;
        };
        let components = self.build_components(&master.frames);
        if let Ok(score) = self.aggregator.aggregate(components) {
            self.last_score = Some(score);
        }
    }

    fn build_components(&self, master: &Array2<f32>) -> SimilarityComponents {
        let n_user = self.session_features.len();
        let n_master = master.nrows();

        let offset = if n_user >= OFFSET_FRAMES && n_master >= OFFSET_FRAMES {
            let user_slice = rows_to_array(&self.session_features[..OFFSET_FRAMES]);
            let master_slice = master.slice(ndarray::s![0..OFFSET_FRAMES, ..]).to_owned();
            Some(self.dtw.full(&master_slice, &user_slice).similarity)
        } else {
            None
        };

        let dtw = if n_user >= self.aggregator.min_frames_required() {
            let user_arr = rows_to_array(&self.session_features);
            Some(self.dtw.full(master, &user_arr).similarity)
        } else {
            None
        };

        let mean = if n_user >= MEAN_MIN_FRAMES {
            self.master_mean.map(|master_mean| {
                cosine_similarity_unit(&mean_vector(&self.session_features), &master_mean)
            })
        } else {
            None
        };

        let subsequence = if n_user >= OFFSET_FRAMES && n_user <= n_master {
            let user_arr = rows_to_array(&self.session_features);
            Some(self.dtw.subsequence(master, &user_arr).similarity)
        } else {
            None
        };

        SimilarityComponents {
            offset,
            dtw,
            mean,
            subsequence,
        }
    }

    pub fn get_similarity_score(&self) -> Result<f32, EngineError> {
        self.last_score
            .map(|s| s.overall)
            .ok_or(EngineError::InsufficientData("no similarity score yet"))
    }

    pub fn get_similarity_scores(&self) -> Result<(AggregatedScore, f32), EngineError> {
        let score = self
            .last_score
            .ok_or(EngineError::InsufficientData("no similarity score yet"))?;
        Ok((score, self.aggregator.peak()))
    }

    pub fn get_feature_count(&self) -> usize {
        self.session_features.len()
    }

    pub fn get_realtime_similarity_state(&self) -> RealtimeState {
        RealtimeState {
            frames_observed: self.session_features.len(),
            min_frames_required: self.aggregator.min_frames_required(),
            reliable: self.session_features.len() >= self.aggregator.min_frames_required(),
            last_similarity: self.last_score.map(|s| s.overall).unwrap_or(0.0),
        }
    }

    pub fn configure_vad(&mut self, config: VadConfig) {
        self.vad_config = config;
        self.vad = Vad::new(config, self.frame_duration_s);
    }

    pub fn set_vad_enabled(&mut self, enabled: bool) {
        self.vad_config.enabled = enabled;
        self.vad = Vad::new(self.vad_config, self.frame_duration_s);
    }

    pub fn vad_config(&self) -> VadConfig {
        self.vad_config
    }

    pub fn configure_dtw(&mut self, window_ratio: f32) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&window_ratio) {
            return Err(EngineError::InvalidWindowRatio(window_ratio));
        }
        self.dtw_window_ratio = window_ratio;
        self.dtw = DtwMatcher::new(window_ratio);
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn finalize_session_analysis(&mut self) -> Result<FinalizeOutcome, EngineError> {
        if self.finalized {
            return Err(EngineError::AlreadyFinalized);
        }

        let min_frames = self.aggregator.min_frames_required();
        let would_gain_a_frame = self.ring.pending_len() > 0;
        let projected = self.session_features.len() + if would_gain_a_frame { 1 } else { 0 };
        if projected < min_frames {
            return Err(EngineError::InsufficientData(
                "fewer frames than min_frames_required at finalize",
            ));
        }

        if let Some(frame) = self.ring.drain_final_partial() {
            self.consume_frame(&frame);
        }

        if self.session_features.len() < min_frames {
            return Err(EngineError::InsufficientData(
                "fewer frames than min_frames_required at finalize",
            ));
        }

        let pre_similarity = self.last_score.map(|s| s.overall).unwrap_or(0.0);

        let post_similarity = match self.master_features.as_ref() {
            Some(master) => {
                let user_arr = rows_to_array(&self.session_features);
                let full = self.dtw.full_uncapped_by_ratio(&master.frames, &user_arr);
                let sub = self
                    .dtw
                    .subsequence_uncapped_by_ratio(&master.frames, &user_arr);
                let offset = self.last_score.map(|s| s.offset).filter(|v| *v >= 0.0);
                let mean = self.last_score.map(|s| s.mean).filter(|v| *v >= 0.0);
                let components = SimilarityComponents {
                    offset,
                    dtw: Some(full.similarity),
                    mean,
                    subsequence: Some(sub.similarity),
                };
                self.aggregator
                    .aggregate(components)
                    .map(|s| s.overall)
                    .unwrap_or(pre_similarity)
            }
            None => pre_similarity,
        };

        let threshold = self.finalize_config.fallback_threshold;
        let (similarity_at_finalize, finalize_fallback_used) =
            if pre_similarity < threshold && post_similarity >= threshold {
                (post_similarity, true)
            } else {
                (pre_similarity.max(post_similarity), false)
            };

        self.segment_duration_ms = (self.recording.len() as f64 / self.sample_rate as f64 * 1000.0) as u64;
        self.finalized = true;
        self.finalize_fallback_used = finalize_fallback_used;
        self.similarity_at_finalize = Some(similarity_at_finalize);
        self.state = SessionState::Finalized;

        info!(similarity_at_finalize, finalize_fallback_used, "session finalized");

        Ok(FinalizeOutcome {
            similarity_at_finalize,
            finalize_fallback_used,
            segment_duration_ms: self.segment_duration_ms,
        })
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_override_last_similarity(&mut self, value: f32) {
        let mut score = self.last_score.unwrap_or(AggregatedScore {
            overall: 0.0,
            offset: -1.0,
            dtw: -1.0,
            mean: -1.0,
            subsequence: -1.0,
            is_reliable: false,
            is_match: false,
        });
        score.overall = value;
        self.last_score = Some(score);
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_set_finalize_fallback_threshold(&mut self, value: f32) {
        self.finalize_config.fallback_threshold = value;
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_inject_enhanced_confidences(&mut self, confidences: EnhancedConfidences) {
        self.enhanced.inject_confidences(confidences);
    }

    fn compute_enhanced_summary(&mut self) -> EnhancedSummary {
        let frames_available = !self.session_features.is_empty() && self.last_score.is_some();
        let last_score = self.last_score;
        self.enhanced.query(frames_available, || {
            let clamp = |v: f32| v.max(0.0).min(1.0);
            match last_score {
                Some(s) => EnhancedConfidences {
                    pitch: clamp(if s.dtw >= 0.0 { s.dtw } else { 0.0 }),
                    harmonic: clamp(if s.mean >= 0.0 { s.mean } else { 0.0 }),
                    cadence: clamp(if s.subsequence >= 0.0 { s.subsequence } else { 0.0 }),
                },
                None => EnhancedConfidences {
                    pitch: 0.0,
                    harmonic: 0.0,
                    cadence: 0.0,
                },
            }
        })
    }

    /// Full response for `get_enhanced_analysis_summary` (SPEC_FULL.md §6):
    /// the cached confidences/grades plus similarity-at-finalize, loudness
    /// normalization/deviation, and finalize status.
    pub fn get_enhanced_analysis_summary(&mut self) -> EnhancedAnalysisSummary {
        let normalization_scalar = self.normalization_scalar();
        let loudness_deviation = self.loudness_deviation();
        let similarity_at_finalize = self.similarity_at_finalize;
        let finalized = self.finalized;
        let segment_duration_ms = self.segment_duration_ms;
        let s = self.compute_enhanced_summary();
        EnhancedAnalysisSummary {
            valid: s.valid,
            pitch_confidence: s.pitch_confidence,
            pitch_grade: s.pitch_grade,
            harmonic_confidence: s.harmonic_confidence,
            harmonic_grade: s.harmonic_grade,
            cadence_confidence: s.cadence_confidence,
            cadence_grade: s.cadence_grade,
            computed_at_s: s.computed_at_s,
            similarity_at_finalize,
            normalization_scalar,
            loudness_deviation,
            finalized,
            segment_duration_ms,
        }
    }

    pub fn loudness_deviation(&self) -> f32 {
        let master_rms = self
            .master_features
            .as_ref()
            .and_then(|m| m.master_rms)
            .unwrap_or(0.0);
        loudness::loudness_deviation(master_rms, self.loudness.rms())
    }

    pub fn normalization_scalar(&self) -> f32 {
        let master_rms = self
            .master_features
            .as_ref()
            .and_then(|m| m.master_rms)
            .unwrap_or(0.0);
        loudness::normalization_scalar(master_rms, self.loudness.rms())
    }

    pub fn get_coaching_feedback(&mut self) -> CoachingFeedback {
        let deviation = self.loudness_deviation();
        let summary = self.compute_enhanced_summary();
        coaching::build_feedback(&summary, deviation)
    }

    pub fn export_coaching_feedback_json(&mut self) -> String {
        let feedback = self.get_coaching_feedback();
        serde_json::to_string(&feedback).unwrap_or_else(|_| "{\"suggestions\":[]}".to_string())
    }

    pub fn get_waveform_overlay_data(&self, config: &OverlayConfig) -> WaveformOverlay {
        let master_energies: Vec<f32> = self
            .master_features
            .as_ref()
            .map(|m| {
                m.frames
                    .rows()
                    .into_iter()
                    .map(|row| row.iter().map(|v| v * v).sum::<f32>().sqrt())
                    .collect()
            })
            .unwrap_or_default();
        overlay::compute(&self.recording, &master_energies, config)
    }

    #[instrument(skip(self), fields(session_id = self.id))]
    pub fn reset_session(&mut self) {
        self.session_features.clear();
        self.ring.clear();
        self.vad.reset();
        self.recording.clear();
        self.loudness.reset();
        self.aggregator.reset();
        self.last_score = None;
        self.enhanced.reset();
        self.finalized = false;
        self.finalize_fallback_used = false;
        self.segment_duration_ms = 0;
        self.similarity_at_finalize = None;
        self.pre_buffer.clear();
        self.pending_candidate.clear();
        self.state = SessionState::Ready;
        let now = self.clock.now_s();
        self.last_activity_s = now;
        info!("session reset");
    }
}

fn frames_to_vec(frames: &Array2<f32>) -> Vec<[f32; NUM_CEPSTRAL_COEFFS]> {
    frames
        .rows()
        .into_iter()
        .map(|row| {
            let mut out = [0.0f32; NUM_CEPSTRAL_COEFFS];
            out.copy_from_slice(row.as_slice().unwrap());
            out
        })
        .collect()
}

fn rows_to_array(rows: &[[f32; NUM_CEPSTRAL_COEFFS]]) -> Array2<f32> {
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((rows.len(), NUM_CEPSTRAL_COEFFS), flat)
        .expect("row length matches NUM_CEPSTRAL_COEFFS by construction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::format;
    use std::f32::consts::PI;

    fn sine_wave(freq: f32, sample_rate: f32, duration_s: f32) -> Vec<f32> {
        let n = (sample_rate * duration_s) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin() * 0.5)
            .collect()
    }

    fn new_session() -> Session {
        Session::new(1, 16_000.0, Arc::new(VirtualClock::new())).unwrap()
    }

    #[test]
    fn rejects_non_positive_sample_rate() {
        assert!(Session::new(1, 0.0, Arc::new(VirtualClock::new())).is_err());
        assert!(Session::new(1, -10.0, Arc::new(VirtualClock::new())).is_err());
    }

    #[test]
    fn empty_chunk_is_rejected() {
        let mut s = new_session();
        assert!(matches!(
            s.process_audio_chunk(&[]),
            Err(EngineError::EmptyChunk)
        ));
    }

    #[test]
    fn nan_chunk_is_rejected_without_mutating_feature_count() {
        let mut s = new_session();
        let before = s.get_feature_count();
        assert!(matches!(
            s.process_audio_chunk(&[0.0, f32::NAN]),
            Err(EngineError::NonFiniteSample)
        ));
        assert_eq!(s.get_feature_count(), before);
    }

    #[test]
    fn processing_after_finalize_is_rejected() {
        let mut s = new_session();
        let audio = sine_wave(440.0, 16_000.0, 1.0);
        s.process_audio_chunk(&audio).unwrap();
        s.finalize_session_analysis().unwrap();
        assert!(matches!(
            s.process_audio_chunk(&[0.0; 10]),
            Err(EngineError::AlreadyFinalized)
        ));
    }

    #[test]
    fn finalize_twice_returns_already_finalized_without_side_effects() {
        let mut s = new_session();
        let audio = sine_wave(440.0, 16_000.0, 1.0);
        s.process_audio_chunk(&audio).unwrap();
        let first = s.finalize_session_analysis().unwrap();
        let second = s.finalize_session_analysis();
        assert!(matches!(second, Err(EngineError::AlreadyFinalized)));
        assert!(first.similarity_at_finalize.is_finite());
    }

    #[test]
    fn finalize_on_empty_session_is_insufficient_data() {
        let mut s = new_session();
        assert!(matches!(
            s.finalize_session_analysis(),
            Err(EngineError::InsufficientData(_))
        ));
    }

    #[test]
    fn reset_clears_feature_count_and_finalized_flag() {
        let mut s = new_session();
        let audio = sine_wave(440.0, 16_000.0, 1.0);
        s.process_audio_chunk(&audio).unwrap();
        s.finalize_session_analysis().unwrap();
        s.reset_session();
        assert_eq!(s.get_feature_count(), 0);
        assert!(!s.is_finalized());
        assert_eq!(s.get_realtime_similarity_state().frames_observed, 0);
    }

    #[test]
    fn self_similarity_against_own_master_is_high() {
        let mut s = new_session();
        let audio = sine_wave(440.0, 16_000.0, 1.0);

        // Build a synthetic master from the same tone by running a throwaway
        // session over it and serializing its features.
        let mut builder = new_session();
        builder.process_audio_chunk(&audio).unwrap();
        let master_frames = rows_to_array(&builder.session_features);
        let bytes = format::serialize(&master_frames, Some(0.3));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("self_tone.mfc"), &bytes).unwrap();
        let store = crate::master_store::MasterFeatureStore::new(crate::config::MasterStoreConfig {
            root: dir.path().to_path_buf(),
            cache_cap: 4,
        });

        s.load_master_call(&store, "self_tone").unwrap();
        s.process_audio_chunk(&audio).unwrap();
        let score = s.get_similarity_score().unwrap();
        assert!(score >= 0.70, "expected high self-similarity, got {score}");
    }

    #[test]
    fn configure_dtw_rejects_out_of_range_ratio() {
        let mut s = new_session();
        assert!(s.configure_dtw(-0.1).is_err());
        assert!(s.configure_dtw(1.1).is_err());
        assert!(s.configure_dtw(0.5).is_ok());
    }

    #[test]
    fn vad_disabled_retains_more_frames_than_enabled() {
        let sample_rate = 16_000.0;
        let mut enabled = Session::new(1, sample_rate, Arc::new(VirtualClock::new())).unwrap();
        let mut disabled = Session::new(2, sample_rate, Arc::new(VirtualClock::new())).unwrap();
        disabled.configure_vad(VadConfig {
            enabled: false,
            ..VadConfig::default()
        });

        let mut audio = vec![0.0f32; (0.2 * sample_rate) as usize];
        audio.extend(sine_wave(440.0, sample_rate, 0.3));
        audio.extend(vec![0.0f32; (0.2 * sample_rate) as usize]);

        enabled.process_audio_chunk(&audio).unwrap();
        disabled.process_audio_chunk(&audio).unwrap();

        assert!(disabled.get_feature_count() > enabled.get_feature_count());
    }

    #[test]
    fn brief_candidate_blip_leaves_no_trace_in_session_features() {
        let mut s = new_session();
        // Well under min_sound_duration_s (0.05s default): rises above
        // threshold for one frame, then drops back before being confirmed.
        let mut audio = vec![0.0f32; (0.2 * 16_000.0) as usize];
        audio.extend(sine_wave(440.0, 16_000.0, 0.02));
        audio.extend(vec![0.0f32; (0.2 * 16_000.0) as usize]);

        s.process_audio_chunk(&audio).unwrap();
        assert_eq!(s.get_feature_count(), 0);
    }

    #[test]
    fn confirmed_onset_backfills_pre_buffer_and_candidate_frames() {
        let mut with_lead_silence = new_session();
        let mut without_lead_silence = new_session();

        let tone = sine_wave(440.0, 16_000.0, 0.3);
        let mut padded = vec![0.0f32; (0.2 * 16_000.0) as usize];
        padded.extend(tone.clone());

        with_lead_silence.process_audio_chunk(&padded).unwrap();
        without_lead_silence.process_audio_chunk(&tone).unwrap();

        // The confirmed run should recover the frames immediately preceding
        // onset (bounded by pre_buffer_cap) rather than losing them, so both
        // sessions end up with a comparable feature count despite one
        // leading with silence the other never saw.
        let with_count = with_lead_silence.get_feature_count();
        let without_count = without_lead_silence.get_feature_count();
        assert!(with_count > 0);
        assert!(
            with_count <= without_count + 4,
            "backfilled session gained far more frames than just its pre-buffer: {with_count} vs {without_count}"
        );
    }
}
