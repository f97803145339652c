//! Session registry and top-level entry point (SPEC_FULL.md §4.13, §5).
//!
//! A single owner of all session state, handing out opaque ids and never
//! letting a session reach back into the registry that owns it. Each session
//! is wrapped in its own `Mutex` so one slow caller never blocks unrelated
//! sessions — the per-session exclusive lock model SPEC_FULL.md §5 calls for.

use crate::clock::{Clock, SystemClock};
use crate::config::{MasterStoreConfig, OverlayConfig, VadConfig};
use crate::coaching::CoachingFeedback;
use crate::error::EngineError;
use crate::master_store::MasterFeatureStore;
use crate::overlay::WaveformOverlay;
use crate::session::{EnhancedAnalysisSummary, FinalizeOutcome, RealtimeState, Session};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Hard ceiling on concurrently registered sessions (SPEC_FULL.md §5).
pub const MAX_SESSIONS: usize = 1000;

pub struct Engine {
    sessions: Mutex<HashMap<u32, Mutex<Session>>>,
    next_id: AtomicU32,
    clock: Arc<dyn Clock>,
    master_store: MasterFeatureStore,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_clock_and_store(
            Arc::new(SystemClock::new()),
            MasterFeatureStore::new(MasterStoreConfig::default()),
        )
    }

    pub fn with_store_config(master_store_config: MasterStoreConfig) -> Self {
        Self::with_clock_and_store(
            Arc::new(SystemClock::new()),
            MasterFeatureStore::new(master_store_config),
        )
    }

    /// Constructs an engine over an injected clock, used by hosts that want
    /// every session they create to share one virtual clock for testing.
    pub fn with_clock_and_store(clock: Arc<dyn Clock>, master_store: MasterFeatureStore) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            clock,
            master_store,
        }
    }

    pub fn master_store(&self) -> &MasterFeatureStore {
        &self.master_store
    }

    #[instrument(skip(self))]
    pub fn create_session(&self, sample_rate: f32) -> Result<u32, EngineError> {
        let mut sessions = self.sessions.lock().map_err(|_| EngineError::Poisoned)?;
        if sessions.len() >= MAX_SESSIONS {
            return Err(EngineError::ResourceExhausted(MAX_SESSIONS));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Session::new(id, sample_rate, self.clock.clone())?;
        sessions.insert(id, Mutex::new(session));
        info!(session_id = id, "session created");
        Ok(id)
    }

    pub fn destroy_session(&self, session_id: u32) -> Result<(), EngineError> {
        let mut sessions = self.sessions.lock().map_err(|_| EngineError::Poisoned)?;
        sessions
            .remove(&session_id)
            .map(|_| ())
            .ok_or(EngineError::SessionNotFound(session_id))
    }

    pub fn active_session_ids(&self) -> Result<Vec<u32>, EngineError> {
        let sessions = self.sessions.lock().map_err(|_| EngineError::Poisoned)?;
        let mut ids: Vec<u32> = sessions
            .iter()
            .filter_map(|(id, s)| s.lock().ok().filter(|s| s.is_active()).map(|_| *id))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn is_session_active(&self, session_id: u32) -> Result<bool, EngineError> {
        self.with_session(session_id, |s| Ok(s.is_active()))
    }

    fn with_session<R>(
        &self,
        session_id: u32,
        f: impl FnOnce(&Session) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let sessions = self.sessions.lock().map_err(|_| EngineError::Poisoned)?;
        let session = sessions
            .get(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let guard = session.lock().map_err(|_| EngineError::Poisoned)?;
        f(&guard)
    }

    fn with_session_mut<R>(
        &self,
        session_id: u32,
        f: impl FnOnce(&mut Session) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let sessions = self.sessions.lock().map_err(|_| EngineError::Poisoned)?;
        let session = sessions
            .get(&session_id)
            .ok_or(EngineError::SessionNotFound(session_id))?;
        let mut guard = session.lock().map_err(|_| EngineError::Poisoned)?;
        f(&mut guard)
    }

    pub fn load_master_call(&self, session_id: u32, call_id: &str) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| s.load_master_call(&self.master_store, call_id))
    }

    pub fn unload_master_call(&self, session_id: u32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.unload_master_call();
            Ok(())
        })
    }

    pub fn process_audio_chunk(&self, session_id: u32, samples: &[f32]) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| s.process_audio_chunk(samples))
    }

    pub fn get_similarity_score(&self, session_id: u32) -> Result<f32, EngineError> {
        self.with_session(session_id, |s| s.get_similarity_score())
    }

    pub fn get_similarity_scores(
        &self,
        session_id: u32,
    ) -> Result<(crate::aggregator::AggregatedScore, f32), EngineError> {
        self.with_session(session_id, |s| s.get_similarity_scores())
    }

    pub fn get_feature_count(&self, session_id: u32) -> Result<usize, EngineError> {
        self.with_session(session_id, |s| Ok(s.get_feature_count()))
    }

    pub fn get_realtime_similarity_state(
        &self,
        session_id: u32,
    ) -> Result<RealtimeState, EngineError> {
        self.with_session(session_id, |s| Ok(s.get_realtime_similarity_state()))
    }

    pub fn configure_vad(&self, session_id: u32, config: VadConfig) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.configure_vad(config);
            Ok(())
        })
    }

    pub fn enable_vad(&self, session_id: u32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.set_vad_enabled(true);
            Ok(())
        })
    }

    pub fn disable_vad(&self, session_id: u32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.set_vad_enabled(false);
            Ok(())
        })
    }

    pub fn get_vad_config(&self, session_id: u32) -> Result<VadConfig, EngineError> {
        self.with_session(session_id, |s| Ok(s.vad_config()))
    }

    pub fn configure_dtw(&self, session_id: u32, window_ratio: f32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| s.configure_dtw(window_ratio))
    }

    pub fn finalize_session_analysis(
        &self,
        session_id: u32,
    ) -> Result<FinalizeOutcome, EngineError> {
        self.with_session_mut(session_id, |s| s.finalize_session_analysis())
    }

    pub fn get_enhanced_analysis_summary(
        &self,
        session_id: u32,
    ) -> Result<EnhancedAnalysisSummary, EngineError> {
        self.with_session_mut(session_id, |s| Ok(s.get_enhanced_analysis_summary()))
    }

    pub fn get_coaching_feedback(&self, session_id: u32) -> Result<CoachingFeedback, EngineError> {
        self.with_session_mut(session_id, |s| Ok(s.get_coaching_feedback()))
    }

    pub fn export_coaching_feedback_to_json(&self, session_id: u32) -> Result<String, EngineError> {
        self.with_session_mut(session_id, |s| Ok(s.export_coaching_feedback_json()))
    }

    pub fn get_waveform_overlay_data(
        &self,
        session_id: u32,
        config: &OverlayConfig,
    ) -> Result<WaveformOverlay, EngineError> {
        self.with_session(session_id, |s| Ok(s.get_waveform_overlay_data(config)))
    }

    pub fn reset_session(&self, session_id: u32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.reset_session();
            Ok(())
        })
    }

    pub fn session_duration_s(&self, session_id: u32) -> Result<f64, EngineError> {
        self.with_session(session_id, |s| Ok(s.duration_s()))
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_override_last_similarity(&self, session_id: u32, value: f32) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.test_override_last_similarity(value);
            Ok(())
        })
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_set_finalize_fallback_threshold(
        &self,
        session_id: u32,
        value: f32,
    ) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.test_set_finalize_fallback_threshold(value);
            Ok(())
        })
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_inject_enhanced_confidences(
        &self,
        session_id: u32,
        confidences: crate::enhanced::EnhancedConfidences,
    ) -> Result<(), EngineError> {
        self.with_session_mut(session_id, |s| {
            s.test_inject_enhanced_confidences(confidences);
            Ok(())
        })
    }

    #[cfg(feature = "test-hooks")]
    pub fn test_inject_master_call(
        &self,
        call_id: &str,
        frames: ndarray::Array2<f32>,
        master_rms: Option<f32>,
    ) {
        self.master_store.inject(call_id, frames, master_rms);
    }

    /// Number of currently registered sessions, active or not. Not part of the
    /// documented API surface; useful for capacity diagnostics and tests.
    pub fn session_count(&self) -> usize {
        match self.sessions.lock() {
            Ok(sessions) => sessions.len(),
            Err(poisoned) => {
                warn!("session registry lock poisoned while reading count");
                poisoned.into_inner().len()
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
