//! "More like this": rank a candidate pool by similarity to one reference vector

use super::error::{RankError, RankResult};
use super::types::{MatchKind, RankedResult, SimilarityOptions, VectorCandidate};
use super::vector::{cosine_similarity, is_valid_vector, validate_vector};

/// Rank `candidates` by cosine similarity to `reference_vector`
///
/// Candidates with a missing or invalid vector are skipped, not scored 0:
/// "no embedding" is unknown, not dissimilar. A candidate sharing
/// `reference_id` is skipped as well. A pool holding nothing but the
/// reference is an error; a pool where nothing survives filtering is an
/// empty result.
pub fn find_similar<M: Clone>(
    reference_id: &str,
    reference_vector: Option<&[f32]>,
    candidates: &[VectorCandidate<M>],
    options: &SimilarityOptions,
    dimension: usize,
) -> RankResult<Vec<RankedResult<M>>> {
    options.validate()?;

    let reference = reference_vector
        .ok_or_else(|| RankError::ReferenceNotFound(reference_id.to_string()))?;
    validate_vector(reference_id, reference, dimension)?;

    if candidates.iter().all(|c| c.id == reference_id) {
        return Err(RankError::EmptyCandidatePool);
    }

    let mut results = Vec::new();
    for candidate in candidates {
        if candidate.id == reference_id {
            continue;
        }
        let Some(vector) = candidate.vector.as_deref() else {
            continue;
        };
        if !is_valid_vector(vector, dimension) {
            continue;
        }

        let similarity = cosine_similarity(reference, vector)?;
        if similarity < options.threshold {
            continue;
        }
        results.push(RankedResult {
            id: candidate.id.clone(),
            metadata: candidate.metadata.clone(),
            lexical_score: 0.0,
            vector_score: similarity,
            combined_score: similarity,
            match_kind: MatchKind::VectorOnly,
        });
    }

    // Stable: equal similarity keeps candidate order
    results.sort_by(|a, b| b.vector_score.total_cmp(&a.vector_score));
    results.truncate(options.limit);
    Ok(results)
}
