//! Vector math shared by the ranker and the similarity finder.

use super::error::{RankError, RankResult};

/// Cosine similarity between two embeddings
///
/// Accumulates in f64 so identical vectors come out at 1.0 rather than
/// 0.99999994. A zero-magnitude vector is a legitimate degenerate embedding
/// and scores 0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> RankResult<f64> {
    if a.len() != b.len() {
        return Err(RankError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// True iff `v` is non-empty, exactly `expected_dim` long and all finite
pub fn is_valid_vector(v: &[f32], expected_dim: usize) -> bool {
    !v.is_empty() && v.len() == expected_dim && v.iter().all(|x| x.is_finite())
}

/// Like `is_valid_vector`, but says why
///
/// Wrong length is `DimensionMismatch`; a NaN/Infinity entry is `InvalidScore`.
pub fn validate_vector(id: &str, v: &[f32], expected_dim: usize) -> RankResult<()> {
    if v.len() != expected_dim || v.is_empty() {
        return Err(RankError::DimensionMismatch {
            expected: expected_dim,
            actual: v.len(),
        });
    }
    if let Some(bad) = v.iter().find(|x| !x.is_finite()) {
        return Err(RankError::InvalidScore {
            id: id.to_string(),
            score: *bad as f64,
        });
    }
    Ok(())
}

/// L2-normalize in place; zero vectors are left untouched
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}
