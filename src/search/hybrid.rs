//! Hybrid ranking: lexical + vector signals merged into one list
//!
//! `combined = lexical * text_weight + vector * vector_weight`
//!
//! Lexical scores are used as the store returns them. They are not rescaled
//! to [0, 1]; callers are responsible for supplying scores in a range
//! comparable to cosine similarity. The ranker is a pure function: a failed
//! query embedding upstream arrives here as an empty vector-hit list.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::error::{RankError, RankResult};
use super::types::{
    HybridOptions, LexicalHit, MatchKind, RankedResult, SearchableItem, VectorCandidate, VectorHit,
};
use super::vector::{cosine_similarity, validate_vector};

/// Row of the outer join, in first-seen order
struct Merged<M> {
    id: String,
    metadata: M,
    lexical_score: f64,
    vector_score: f64,
    in_lexical: bool,
    in_vector: bool,
}

/// Merge lexical and vector hits into one ranked list
///
/// Full outer join by id: an item needs to appear in only one list. Sort
/// order is combined score, then vector score, then first appearance
/// (lexical list order, followed by vector-only items in vector list order).
/// Duplicate ids within one list keep their first occurrence.
pub fn rank_hybrid<M: Clone>(
    lexical_hits: &[LexicalHit<M>],
    vector_hits: &[VectorHit<M>],
    options: &HybridOptions,
) -> RankResult<Vec<RankedResult<M>>> {
    options.validate()?;

    let mut merged: Vec<Merged<M>> = Vec::with_capacity(lexical_hits.len() + vector_hits.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(merged.capacity());

    for hit in lexical_hits {
        check_lexical_score(&hit.id, hit.score)?;
        if index.contains_key(hit.id.as_str()) {
            continue;
        }
        index.insert(hit.id.as_str(), merged.len());
        merged.push(Merged {
            id: hit.id.clone(),
            metadata: hit.metadata.clone(),
            lexical_score: hit.score,
            vector_score: 0.0,
            in_lexical: true,
            in_vector: false,
        });
    }

    for hit in vector_hits {
        check_similarity(&hit.id, hit.similarity)?;
        match index.get(hit.id.as_str()) {
            Some(&i) => {
                let row = &mut merged[i];
                if !row.in_vector {
                    row.vector_score = hit.similarity;
                    row.in_vector = true;
                }
            }
            None => {
                index.insert(hit.id.as_str(), merged.len());
                merged.push(Merged {
                    id: hit.id.clone(),
                    metadata: hit.metadata.clone(),
                    lexical_score: 0.0,
                    vector_score: hit.similarity,
                    in_lexical: false,
                    in_vector: true,
                });
            }
        }
    }

    Ok(finish(merged, options))
}

/// Rank pre-assembled items against an optional query vector
///
/// Items carrying neither a lexical score nor a vector still take part,
/// with `MatchKind::None` and a combined score of 0. A present vector of the
/// wrong length is rejected. Without a query vector, the vector signal is
/// absent for every item.
pub fn rank_items<M: Clone>(
    items: &[SearchableItem<M>],
    query_vector: Option<&[f32]>,
    dimension: usize,
    options: &HybridOptions,
) -> RankResult<Vec<RankedResult<M>>> {
    options.validate()?;
    if let Some(query) = query_vector {
        validate_vector("<query>", query, dimension)?;
    }

    let mut merged = Vec::with_capacity(items.len());
    for item in items {
        if let Some(score) = item.lexical_score {
            check_lexical_score(&item.id, score)?;
        }
        let vector_score = match (query_vector, item.vector.as_deref()) {
            (Some(query), Some(vector)) => {
                validate_vector(&item.id, vector, dimension)?;
                Some(cosine_similarity(query, vector)?)
            }
            _ => None,
        };
        merged.push(Merged {
            id: item.id.clone(),
            metadata: item.metadata.clone(),
            lexical_score: item.lexical_score.unwrap_or(0.0),
            vector_score: vector_score.unwrap_or(0.0),
            in_lexical: item.lexical_score.is_some(),
            in_vector: vector_score.is_some(),
        });
    }

    Ok(finish(merged, options))
}

/// Score stored embeddings against a query vector
///
/// Candidates without a vector are skipped; a vector whose length differs
/// from `dimension` fails the whole call. Hits come back best first and are
/// capped at `max_hits`.
pub fn vector_hits_from_candidates<M: Clone>(
    query_vector: &[f32],
    candidates: &[VectorCandidate<M>],
    dimension: usize,
    max_hits: usize,
) -> RankResult<Vec<VectorHit<M>>> {
    validate_vector("<query>", query_vector, dimension)?;

    let mut hits = Vec::new();
    for candidate in candidates {
        let Some(vector) = candidate.vector.as_deref() else {
            continue;
        };
        validate_vector(&candidate.id, vector, dimension)?;
        hits.push(VectorHit {
            id: candidate.id.clone(),
            similarity: cosine_similarity(query_vector, vector)?,
            metadata: candidate.metadata.clone(),
        });
    }

    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(max_hits);
    Ok(hits)
}

fn finish<M>(merged: Vec<Merged<M>>, options: &HybridOptions) -> Vec<RankedResult<M>> {
    let mut results: Vec<RankedResult<M>> = merged
        .into_iter()
        .map(|row| {
            let combined_score =
                row.lexical_score * options.text_weight + row.vector_score * options.vector_weight;
            RankedResult {
                match_kind: MatchKind::derive(row.in_lexical, row.in_vector),
                id: row.id,
                metadata: row.metadata,
                lexical_score: row.lexical_score,
                vector_score: row.vector_score,
                combined_score,
            }
        })
        .filter(|r| r.combined_score >= options.threshold)
        .collect();

    // sort_by is stable: equal keys keep first-seen order
    results.sort_by(compare_ranked);
    results.truncate(options.limit);
    results
}

fn compare_ranked<M>(a: &RankedResult<M>, b: &RankedResult<M>) -> Ordering {
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| b.vector_score.total_cmp(&a.vector_score))
}

fn check_lexical_score(id: &str, score: f64) -> RankResult<()> {
    if !score.is_finite() || score < 0.0 {
        return Err(RankError::InvalidScore {
            id: id.to_string(),
            score,
        });
    }
    Ok(())
}

fn check_similarity(id: &str, similarity: f64) -> RankResult<()> {
    if !similarity.is_finite() || !(-1.0..=1.0).contains(&similarity) {
        return Err(RankError::InvalidScore {
            id: id.to_string(),
            score: similarity,
        });
    }
    Ok(())
}
