//! Error types for the ranking core.
//!
//! Every variant is a deterministic validation failure on the caller's own
//! input. Nothing here wraps I/O: storage and embedding errors belong to the
//! layers around the core.

use thiserror::Error;

/// Tolerance for `text_weight + vector_weight == 1`.
pub const WEIGHT_EPSILON: f64 = 0.001;

/// Errors returned by ranking, similarity and vector math.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankError {
    /// Weights outside [0, 1] or not summing to 1 (within `WEIGHT_EPSILON`)
    #[error("Invalid weights: text {text_weight} + vector {vector_weight} must each be in [0, 1] and sum to 1")]
    InvalidWeights {
        text_weight: f64,
        vector_weight: f64,
    },
    /// Two vectors (or a vector and the deployment dimension) disagree in length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Similarity search on a reference with no embedding
    #[error("Reference not found or not embedded: {0}")]
    ReferenceNotFound(String),
    /// Similarity search over an empty candidate list
    #[error("Candidate pool is empty")]
    EmptyCandidatePool,
    /// Blank search query
    #[error("Query is empty")]
    EmptyQuery,
    /// Result cap of zero
    #[error("Invalid limit: {0} (must be at least 1)")]
    InvalidLimit(usize),
    /// Threshold outside its allowed range
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(f64),
    /// Negative or non-finite lexical score, or similarity outside [-1, 1]
    #[error("Invalid score for '{id}': {score}")]
    InvalidScore { id: String, score: f64 },
}

pub type RankResult<T> = std::result::Result<T, RankError>;
