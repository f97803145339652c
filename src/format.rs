//! Binary `.mfc` master-feature file format (SPEC_FULL.md §3, §4.4).
//!
//! Layout: `u32 frame_count (F)`, `u32 coeff_count (C, must equal
//! [`crate::mfcc::NUM_CEPSTRAL_COEFFS`])`, then `F * C` little-endian `f32`
//! values in row-major order, followed optionally by one trailing
//! little-endian `f32` master RMS value used by [`crate::loudness`].
//!
//! Parsed with explicit `from_le_bytes` rather than a zero-copy cast crate
//! (e.g. `bytemuck`, used elsewhere in the corpus) because endianness must be
//! pinned regardless of the host's native byte order — these files are meant
//! to travel between machines.

use crate::error::EngineError;
use crate::mfcc::NUM_CEPSTRAL_COEFFS;
use ndarray::Array2;

const HEADER_LEN: usize = 8;

pub struct MasterFeatures {
    pub frames: Array2<f32>,
    pub master_rms: Option<f32>,
}

pub fn parse(call_id: &str, bytes: &[u8]) -> Result<MasterFeatures, EngineError> {
    if bytes.len() < HEADER_LEN {
        return Err(EngineError::InvalidMasterFormat(
            call_id.to_string(),
            "file shorter than header".into(),
        ));
    }
    let frame_count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let coeff_count = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if frame_count == 0 {
        return Err(EngineError::InvalidMasterFormat(
            call_id.to_string(),
            "frame count is zero".into(),
        ));
    }
    if coeff_count != NUM_CEPSTRAL_COEFFS {
        return Err(EngineError::InvalidMasterFormat(
            call_id.to_string(),
            format!(
                "expected {} coefficients per frame, file declares {}",
                NUM_CEPSTRAL_COEFFS, coeff_count
            ),
        ));
    }

    let payload_len = frame_count
        .checked_mul(coeff_count)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            EngineError::InvalidMasterFormat(call_id.to_string(), "frame count overflow".into())
        })?;
    let body = &bytes[HEADER_LEN..];
    if body.len() < payload_len {
        return Err(EngineError::InvalidMasterFormat(
            call_id.to_string(),
            format!(
                "declared {} frames but only {} bytes remain",
                frame_count,
                body.len()
            ),
        ));
    }

    let mut values = Vec::with_capacity(frame_count * coeff_count);
    for chunk in body[..payload_len].chunks_exact(4) {
        values.push(f32::from_le_bytes(chunk.try_into().unwrap()));
    }
    let frames = Array2::from_shape_vec((frame_count, coeff_count), values).map_err(|e| {
        EngineError::InvalidMasterFormat(call_id.to_string(), format!("shape error: {e}"))
    })?;

    if frames.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::InvalidMasterFormat(
            call_id.to_string(),
            "feature matrix contains a non-finite value".into(),
        ));
    }

    let trailer = &body[payload_len..];
    let master_rms = if trailer.len() >= 4 {
        Some(f32::from_le_bytes(trailer[0..4].try_into().unwrap()))
    } else {
        None
    };

    Ok(MasterFeatures { frames, master_rms })
}

pub fn serialize(frames: &Array2<f32>, master_rms: Option<f32>) -> Vec<u8> {
    let (f, c) = frames.dim();
    let mut out = Vec::with_capacity(HEADER_LEN + f * c * 4 + 4);
    out.extend_from_slice(&(f as u32).to_le_bytes());
    out.extend_from_slice(&(c as u32).to_le_bytes());
    for v in frames.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    if let Some(rms) = master_rms {
        out.extend_from_slice(&rms.to_le_bytes());
    }
    out
}

/// Rejects empty paths, path separators, parent-directory components, and
/// ids longer than 256 bytes — a master call id is a bare identifier, never
/// a path fragment.
pub fn validate_call_id(call_id: &str) -> Result<(), EngineError> {
    if call_id.is_empty()
        || call_id.len() > 256
        || call_id.contains('/')
        || call_id.contains('\\')
        || call_id.contains("..")
    {
        return Err(EngineError::InvalidMasterCallId(call_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn round_trips_frames_and_rms() {
        let frames: Array2<f32> = Array2::from_shape_fn((4, NUM_CEPSTRAL_COEFFS), |(i, j)| {
            (i * NUM_CEPSTRAL_COEFFS + j) as f32
        });
        let bytes = serialize(&frames, Some(0.42));
        let parsed = parse("test", &bytes).unwrap();
        assert_eq!(parsed.frames, frames);
        assert_eq!(parsed.master_rms, Some(0.42));
    }

    #[test]
    fn missing_trailer_yields_no_rms() {
        let frames: Array2<f32> = Array2::zeros((2, NUM_CEPSTRAL_COEFFS));
        let bytes = serialize(&frames, None);
        let parsed = parse("test", &bytes).unwrap();
        assert_eq!(parsed.master_rms, None);
    }

    #[test]
    fn zero_frame_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(NUM_CEPSTRAL_COEFFS as u32).to_le_bytes());
        assert!(parse("test", &bytes).is_err());
    }

    #[test]
    fn wrong_coeff_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 28]);
        assert!(parse("test", &bytes).is_err());
    }

    #[test]
    fn truncated_body_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(&(NUM_CEPSTRAL_COEFFS as u32).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        assert!(parse("test", &bytes).is_err());
    }

    #[test]
    fn non_finite_payload_is_rejected() {
        let mut frames: Array2<f32> = Array2::zeros((1, NUM_CEPSTRAL_COEFFS));
        frames[[0, 0]] = f32::NAN;
        let bytes = serialize(&frames, None);
        assert!(parse("test", &bytes).is_err());
    }

    #[test]
    fn call_id_validation_rejects_traversal() {
        assert!(validate_call_id("").is_err());
        assert!(validate_call_id("../escape").is_err());
        assert!(validate_call_id("a/b").is_err());
        assert!(validate_call_id(&"x".repeat(300)).is_err());
        assert!(validate_call_id("elk_bugle_01").is_ok());
    }
}
