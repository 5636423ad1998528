//! recall-search library
//!
//! Hybrid lexical + vector search over conversational entries.
//!
//! # Modules
//!
//! - `core`: Workspace layout, configuration, entry files and checksums
//! - `search`: Ranking core (cosine, hybrid merge, similarity, embedding
//!   lifecycle), the SQLite candidate store and the search engine
//! - `mcp`: MCP server exposing search to AI assistants

pub mod core;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod search;

// Re-exports for convenience
pub use core::config::SearchConfig;
pub use core::entry::{collect_all_entries, Entry, EntryKind};
pub use core::paths::RecallPaths;
pub use search::{
    cosine_similarity, find_similar, rank_hybrid, EmbeddingCoordinator, EmbeddingProvider,
    EmbeddingStatus, HybridOptions, MatchKind, RankError, RankedResult, SearchEngine,
    SearchScope, SimilarityOptions,
};
