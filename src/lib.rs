//! Embeddable real-time audio similarity engine.
//!
//! Streams raw audio in, extracts MFCC features, aligns them against a
//! pre-analyzed reference ("master call") with banded DTW, and publishes a
//! multi-component similarity score plus coaching feedback and a waveform
//! overlay for display. See `SPEC_FULL.md` for the full component design.
//!
//! [`Engine`] is the entry point: it owns every [`session::Session`] behind
//! an opaque integer id and a per-session lock, and a shared
//! [`master_store::MasterFeatureStore`] cache of reference feature matrices.

pub mod aggregator;
pub mod clock;
pub mod coaching;
pub mod config;
pub mod distance;
pub mod dtw;
pub mod engine;
pub mod enhanced;
pub mod error;
pub mod format;
pub mod loudness;
pub mod master_store;
pub mod mfcc;
pub mod overlay;
pub mod ring_buffer;
pub mod session;
pub mod vad;

pub use engine::Engine;
pub use error::{EngineError, EngineResult, Status};
pub use session::{EnhancedAnalysisSummary, FinalizeOutcome, RealtimeState, SessionState};
