//! Shared types for the ranking core.
//!
//! Metadata is generic: the core copies it into results and never looks
//! inside it.

use serde::{Deserialize, Serialize};

use super::error::{RankError, RankResult, WEIGHT_EPSILON};

/// A lexical (full-text) hit as returned by the candidate store
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit<M> {
    pub id: String,
    pub score: f64,
    pub metadata: M,
}

/// A vector hit: cosine similarity between the query and a stored embedding
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit<M> {
    pub id: String,
    pub similarity: f64,
    pub metadata: M,
}

/// A stored embedding with its metadata, as listed by the candidate store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorCandidate<M> {
    pub id: String,
    pub vector: Option<Vec<f32>>,
    pub checksum: Option<String>,
    pub metadata: M,
}

/// The unit ranked in one call, built from store output
#[derive(Debug, Clone, PartialEq)]
pub struct SearchableItem<M> {
    pub id: String,
    /// `None` means the item did not match the lexical query
    pub lexical_score: Option<f64>,
    /// `None` means no embedding has been generated yet
    pub vector: Option<Vec<f32>>,
    pub vector_checksum: Option<String>,
    pub metadata: M,
}

/// Which signal lists contained a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    LexicalOnly,
    VectorOnly,
    Both,
    None,
}

impl MatchKind {
    pub fn derive(in_lexical: bool, in_vector: bool) -> Self {
        match (in_lexical, in_vector) {
            (true, true) => Self::Both,
            (true, false) => Self::LexicalOnly,
            (false, true) => Self::VectorOnly,
            (false, false) => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LexicalOnly => "lexical-only",
            Self::VectorOnly => "vector-only",
            Self::Both => "both",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked output row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<M> {
    pub id: String,
    pub metadata: M,
    pub lexical_score: f64,
    pub vector_score: f64,
    pub combined_score: f64,
    pub match_kind: MatchKind,
}

/// Options for `rank_hybrid`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridOptions {
    pub text_weight: f64,
    pub vector_weight: f64,
    pub limit: usize,
    /// Results with `combined_score < threshold` are dropped
    pub threshold: f64,
}

impl HybridOptions {
    pub fn new(text_weight: f64, vector_weight: f64, limit: usize, threshold: f64) -> Self {
        Self {
            text_weight,
            vector_weight,
            limit,
            threshold,
        }
    }

    pub fn validate(&self) -> RankResult<()> {
        validate_weights(self.text_weight, self.vector_weight)?;
        if self.limit == 0 {
            return Err(RankError::InvalidLimit(self.limit));
        }
        if !self.threshold.is_finite() {
            return Err(RankError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Options for `find_similar`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityOptions {
    pub limit: usize,
    /// Must be in [0, 1]
    pub threshold: f64,
}

impl SimilarityOptions {
    pub fn new(limit: usize, threshold: f64) -> Self {
        Self { limit, threshold }
    }

    pub fn validate(&self) -> RankResult<()> {
        if self.limit == 0 {
            return Err(RankError::InvalidLimit(self.limit));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(RankError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Both weights in [0, 1] and summing to 1 within `WEIGHT_EPSILON`
pub fn validate_weights(text_weight: f64, vector_weight: f64) -> RankResult<()> {
    let in_range = |w: f64| w.is_finite() && (0.0..=1.0).contains(&w);
    if !in_range(text_weight)
        || !in_range(vector_weight)
        || (text_weight + vector_weight - 1.0).abs() > WEIGHT_EPSILON
    {
        return Err(RankError::InvalidWeights {
            text_weight,
            vector_weight,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_conservation() {
        assert!(matches!(
            validate_weights(0.4, 0.4),
            Err(RankError::InvalidWeights { .. })
        ));
        assert!(validate_weights(0.3, 0.7).is_ok());
        assert!(validate_weights(1.0, 0.0).is_ok());
        assert!(validate_weights(0.3, 0.7005).is_ok());
        assert!(validate_weights(-0.2, 1.2).is_err());
        assert!(validate_weights(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_hybrid_options_validation() {
        assert!(HybridOptions::new(0.3, 0.7, 10, 0.0).validate().is_ok());
        assert_eq!(
            HybridOptions::new(0.3, 0.7, 0, 0.0).validate(),
            Err(RankError::InvalidLimit(0))
        );
        assert!(matches!(
            HybridOptions::new(0.3, 0.7, 5, f64::NAN).validate(),
            Err(RankError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_similarity_options_validation() {
        assert!(SimilarityOptions::new(5, 0.0).validate().is_ok());
        assert!(SimilarityOptions::new(5, 1.0).validate().is_ok());
        assert_eq!(
            SimilarityOptions::new(5, 1.5).validate(),
            Err(RankError::InvalidThreshold(1.5))
        );
        assert_eq!(
            SimilarityOptions::new(0, 0.5).validate(),
            Err(RankError::InvalidLimit(0))
        );
    }

    #[test]
    fn test_match_kind_serializes_kebab_case() {
        assert_eq!(MatchKind::derive(true, true), MatchKind::Both);
        assert_eq!(MatchKind::derive(false, false), MatchKind::None);
        assert_eq!(
            serde_json::to_string(&MatchKind::LexicalOnly).unwrap(),
            "\"lexical-only\""
        );
        assert_eq!(MatchKind::VectorOnly.to_string(), "vector-only");
    }
}
