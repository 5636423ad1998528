//! The candidate store seam
//!
//! The ranking core never talks to storage. A store hands it the lexical
//! hits for a query and the embeddings in scope, and the caller merges them.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::types::{LexicalHit, VectorCandidate};
use crate::core::entry::EntryKind;

/// Which entries a query may see
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchScope {
    pub owner: Option<String>,
    pub kind: Option<EntryKind>,
    pub tag: Option<String>,
}

impl SearchScope {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Source of ranking candidates
pub trait CandidateStore {
    type Metadata: Clone;

    /// Full-text matches for `query`, best first, scores non-negative
    fn find_lexical_matches(
        &self,
        query: &str,
        scope: &SearchScope,
    ) -> Result<Vec<LexicalHit<Self::Metadata>>>;

    /// Every entry in scope with its embedding, if any
    fn list_vectors(&self, scope: &SearchScope) -> Result<Vec<VectorCandidate<Self::Metadata>>>;
}
