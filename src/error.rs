//! Typed domain errors (`EngineError`) and the stable wire-level `Status` code
//! every public entry point ultimately collapses to (see SPEC_FULL.md §6-§7).

use thiserror::Error;

/// Internal, structured error type. Carries enough context for logs and tests;
/// never exposed across the public API boundary directly (see [`Status`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("sample_rate must be > 0 Hz, got {0}")]
    InvalidSampleRate(f32),

    #[error("audio chunk is empty")]
    EmptyChunk,

    #[error("audio chunk contains a non-finite sample (NaN or Inf)")]
    NonFiniteSample,

    #[error("dtw window_ratio must be in [0, 1], got {0}")]
    InvalidWindowRatio(f32),

    #[error("master call id is invalid: {0}")]
    InvalidMasterCallId(String),

    #[error("session {0} not found")]
    SessionNotFound(u32),

    #[error("master call '{0}' not found")]
    MasterCallNotFound(String),

    #[error("master feature file for '{0}' is malformed: {1}")]
    InvalidMasterFormat(String, String),

    #[error("io error loading master call '{0}': {1}")]
    MasterIoError(String, String),

    #[error("session is already finalized")]
    AlreadyFinalized,

    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),

    #[error("engine is at its session capacity ({0})")]
    ResourceExhausted(usize),

    #[error("engine failed to initialize: {0}")]
    InitFailed(String),

    #[error("an internal lock was poisoned by a prior panic")]
    Poisoned,
}

/// Stable wire-level status code. Values are part of the public ABI contract
/// and must never be renumbered (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidParams = -1,
    SessionNotFound = -2,
    FileNotFound = -3,
    ProcessingError = -4,
    InsufficientData = -5,
    ResourceExhausted = -6,
    InitFailed = -7,
    AlreadyFinalized = -8,
    InvalidFormat = -9,
}

impl From<&EngineError> for Status {
    fn from(err: &EngineError) -> Self {
        use EngineError::*;
        match err {
            InvalidSampleRate(_)
            | EmptyChunk
            | NonFiniteSample
            | InvalidWindowRatio(_)
            | InvalidMasterCallId(_) => Status::InvalidParams,
            SessionNotFound(_) => Status::SessionNotFound,
            MasterCallNotFound(_) => Status::FileNotFound,
            InvalidMasterFormat(_, _) => Status::InvalidFormat,
            MasterIoError(_, _) => Status::ProcessingError,
            AlreadyFinalized => Status::AlreadyFinalized,
            InsufficientData(_) => Status::InsufficientData,
            ResourceExhausted(_) => Status::ResourceExhausted,
            InitFailed(_) => Status::InitFailed,
            Poisoned => Status::ProcessingError,
        }
    }
}

impl From<EngineError> for Status {
    fn from(err: EngineError) -> Self {
        Status::from(&err)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
