//! Small vector-distance helpers used by the similarity aggregator's "mean"
//! component (SPEC_FULL.md §4.6). Grounded directly on
//! `similarity::distance::{dot_product, cosine_similarity}` in the example
//! corpus, adapted to our fixed 13-dimensional MFCC vectors and mapped into
//! `[0, 1]` since the aggregator treats every component as a similarity, not
//! a signed correlation.

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn magnitude(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Cosine similarity rescaled from `[-1, 1]` into `[0, 1]`, matching the
/// aggregator's convention that every component is a non-negative similarity.
/// Returns `0.5` (the midpoint) if either vector has zero magnitude.
pub fn cosine_similarity_unit(a: &[f32], b: &[f32]) -> f32 {
    let denom = magnitude(a) * magnitude(b);
    if denom <= f32::EPSILON {
        return 0.5;
    }
    let cosine = (dot_product(a, b) / denom).clamp(-1.0, 1.0);
    (cosine + 1.0) / 2.0
}

pub fn mean_vector(frames: &[[f32; crate::mfcc::NUM_CEPSTRAL_COEFFS]]) -> [f32; crate::mfcc::NUM_CEPSTRAL_COEFFS] {
    let mut sum = [0.0f32; crate::mfcc::NUM_CEPSTRAL_COEFFS];
    for frame in frames {
        for (s, v) in sum.iter_mut().zip(frame.iter()) {
            *s += v;
        }
    }
    let n = frames.len().max(1) as f32;
    for v in sum.iter_mut() {
        *v /= n;
    }
    sum
}
