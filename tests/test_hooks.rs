//! Scenarios that require direct state injection (SPEC_FULL.md §8, S5/S6),
//! only meaningful with the `test-hooks` feature enabled.

#![cfg(feature = "test-hooks")]

use mastercall_core::config::MasterStoreConfig;
use mastercall_core::mfcc::{MfccConfig, MfccExtractor, NUM_CEPSTRAL_COEFFS};
use mastercall_core::ring_buffer::RingBuffer;
use mastercall_core::Engine;
use ndarray::Array2;
use std::f32::consts::PI;

fn sine_wave(freq: f32, sample_rate: f32, duration_s: f32, amp: f32) -> Vec<f32> {
    let n = (sample_rate * duration_s) as usize;
    (0..n)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin() * amp)
        .collect()
}

fn extract_all_features(audio: &[f32], sample_rate: f32) -> Array2<f32> {
    let cfg = MfccConfig {
        sample_rate,
        ..MfccConfig::default()
    };
    let mut ring = RingBuffer::new(cfg.frame_size, cfg.hop_size);
    let mut mfcc = MfccExtractor::new(cfg);
    ring.push_slice(audio);
    let mut rows = Vec::new();
    while let Some(frame) = ring.drain_frame() {
        let frame = frame.to_vec();
        if let Some(coeffs) = mfcc.process_frame(&frame) {
            rows.push(coeffs);
        }
    }
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((rows.len(), NUM_CEPSTRAL_COEFFS), flat).unwrap()
}

fn engine_with_temp_store() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::with_store_config(MasterStoreConfig {
        root: dir.path().to_path_buf(),
        cache_cap: 8,
    });
    (engine, dir)
}

#[test]
fn s5_finalize_fallback_promotes_a_low_prefinalize_score() {
    let (engine, _dir) = engine_with_temp_store();
    let audio = sine_wave(440.0, 16_000.0, 1.0, 0.5);
    let frames = extract_all_features(&audio, 16_000.0);
    engine.test_inject_master_call("call", frames, Some(0.3));

    let id = engine.create_session(16_000.0).unwrap();
    engine.load_master_call(id, "call").unwrap();
    engine.process_audio_chunk(id, &audio).unwrap();

    engine.test_set_finalize_fallback_threshold(id, 0.40).unwrap();
    engine.test_override_last_similarity(id, 0.10).unwrap();

    let outcome = engine.finalize_session_analysis(id).unwrap();
    assert!(outcome.finalize_fallback_used);
    assert!(outcome.similarity_at_finalize >= 0.50);
}

#[test]
fn s6_finalize_fallback_not_used_when_prefinalize_already_passes() {
    let (engine, _dir) = engine_with_temp_store();
    let audio = sine_wave(440.0, 16_000.0, 1.0, 0.5);
    let frames = extract_all_features(&audio, 16_000.0);
    engine.test_inject_master_call("call", frames, Some(0.3));

    let id = engine.create_session(16_000.0).unwrap();
    engine.load_master_call(id, "call").unwrap();
    engine.process_audio_chunk(id, &audio).unwrap();

    engine.test_set_finalize_fallback_threshold(id, 0.40).unwrap();
    engine.test_override_last_similarity(id, 0.90).unwrap();

    let outcome = engine.finalize_session_analysis(id).unwrap();
    assert!(!outcome.finalize_fallback_used);
}

#[test]
fn b5_enhanced_summary_goes_stale_after_virtual_clock_advance() {
    use mastercall_core::clock::VirtualClock;
    use std::sync::Arc;
    use std::time::Duration;

    let clock = Arc::new(VirtualClock::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::with_clock_and_store(
        clock.clone(),
        mastercall_core::master_store::MasterFeatureStore::new(MasterStoreConfig {
            root: dir.path().to_path_buf(),
            cache_cap: 4,
        }),
    );

    let audio = sine_wave(440.0, 16_000.0, 1.0, 0.5);
    let frames = extract_all_features(&audio, 16_000.0);
    engine.test_inject_master_call("call", frames, Some(0.3));

    let id = engine.create_session(16_000.0).unwrap();
    engine.load_master_call(id, "call").unwrap();
    engine.process_audio_chunk(id, &audio).unwrap();

    engine
        .test_inject_enhanced_confidences(
            id,
            mastercall_core::enhanced::EnhancedConfidences {
                pitch: 0.9,
                harmonic: 0.9,
                cadence: 0.9,
            },
        )
        .unwrap();
    let first = engine.get_enhanced_analysis_summary(id).unwrap();
    assert!(first.valid);

    clock.advance(Duration::from_millis(2100));
    let second = engine.get_enhanced_analysis_summary(id).unwrap();
    assert!(second.valid);
    assert!(second.computed_at_s > first.computed_at_s);
}

#[test]
fn reset_session_via_engine_clears_finalized_flag() {
    let (engine, dir) = engine_with_temp_store();
    let audio = sine_wave(440.0, 16_000.0, 1.0, 0.5);
    let frames = extract_all_features(&audio, 16_000.0);
    let bytes = mastercall_core::format::serialize(&frames, Some(0.3));
    std::fs::write(dir.path().join("call.mfc"), bytes).unwrap();

    let id = engine.create_session(16_000.0).unwrap();
    engine.load_master_call(id, "call").unwrap();
    engine.process_audio_chunk(id, &audio).unwrap();
    engine.finalize_session_analysis(id).unwrap();
    engine.reset_session(id).unwrap();

    engine.process_audio_chunk(id, &audio).unwrap();
    assert!(engine.finalize_session_analysis(id).is_ok());
}
