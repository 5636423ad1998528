//! Hybrid search and ranking
//!
//! The ranking core (`vector`, `hybrid`, `similar`, `lifecycle`) is pure and
//! storage-agnostic. `vectordb` is the SQLite candidate store and `engine`
//! wires store, provider and core together.

pub mod embedding;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod lifecycle;
pub mod similar;
pub mod store;
pub mod types;
pub mod vector;
pub mod vectordb;

pub use embedding::{EmbeddingProvider, HarmonicEmbedder, ProviderError};
pub use engine::{hybrid_search, IndexingStats, SearchEngine, SearchOutcome};
pub use error::{RankError, RankResult};
pub use hybrid::{rank_hybrid, rank_items};
pub use lifecycle::{check_embedding_status, EmbeddingCoordinator, EmbeddingStatus};
pub use similar::find_similar;
pub use store::{CandidateStore, SearchScope};
pub use types::{
    HybridOptions, LexicalHit, MatchKind, RankedResult, SearchableItem, SimilarityOptions,
    VectorCandidate, VectorHit,
};
pub use vector::cosine_similarity;
pub use vectordb::{EntryMetadata, EntryStore};
