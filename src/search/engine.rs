//! Search engine: store + embedding provider + ranking core
//!
//! Owns the caller-side decisions the ranker leaves open: a provider failure
//! degrades a query to lexical-only, vector hits are capped before merging,
//! and index refreshes go through the coordinator so identical content is
//! embedded once.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::embedding::{EmbeddingProvider, HarmonicEmbedder};
use super::error::RankError;
use super::hybrid::{rank_hybrid, vector_hits_from_candidates};
use super::lifecycle::{
    ComputationOutcome, ComputationTicket, EmbeddingCoordinator, EmbeddingStatus,
};
use super::similar::find_similar;
use super::store::{CandidateStore, SearchScope};
use super::types::{HybridOptions, RankedResult, SimilarityOptions, VectorCandidate};
use super::vector::is_valid_vector;
use super::vectordb::{EntryMetadata, EntryRecord, EntryStore, IndexStats};
use crate::core::config::SearchConfig;
use crate::core::entry::{collect_all_entries, Entry};
use crate::core::paths::RecallPaths;

/// Embedding computations running at once during an index refresh
const MAX_CONCURRENT_EMBEDDINGS: usize = 4;

const PREVIEW_CHARS: usize = 160;

/// Ranked results plus how they were produced
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome<M> {
    pub results: Vec<RankedResult<M>>,
    /// The query embedding failed; results are lexical-only
    pub degraded: bool,
    pub lexical_candidates: usize,
    pub vector_candidates: usize,
}

/// Indexing statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexingStats {
    pub entries: usize,
    /// Embeddings computed in this run
    pub embedded: usize,
    /// Entries that reused another entry's computation (same content)
    pub shared: usize,
    /// Already up to date
    pub fresh: usize,
    pub failed: usize,
    /// Entries removed because their file is gone
    pub pruned: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingReportRow {
    pub id: String,
    pub title: String,
    pub status: EmbeddingStatus,
}

/// Lifecycle status of every entry in scope
#[derive(Debug, Default, Clone, Serialize)]
pub struct EmbeddingReport {
    pub rows: Vec<EmbeddingReportRow>,
    pub missing: usize,
    pub fresh: usize,
    pub stale: usize,
    pub pending: usize,
}

/// One pending computation in an index refresh
struct PlannedEmbedding {
    id: String,
    checksum: String,
    text: String,
}

struct EmbeddingJob {
    id: String,
    checksum: String,
    shared: bool,
    outcome: ComputationOutcome,
}

/// Hybrid search over any candidate store
///
/// `provider` of `None` means lexical-only by request. A provider error or a
/// query vector of the wrong shape degrades to lexical-only instead of
/// failing the query.
pub fn hybrid_search<S: CandidateStore>(
    store: &S,
    provider: Option<&dyn EmbeddingProvider>,
    query: &str,
    scope: &SearchScope,
    options: &HybridOptions,
    dimension: usize,
    vector_candidates: usize,
) -> Result<SearchOutcome<S::Metadata>> {
    if query.trim().is_empty() {
        return Err(RankError::EmptyQuery.into());
    }
    options.validate()?;

    let lexical_hits = store.find_lexical_matches(query, scope)?;

    let mut degraded = false;
    let query_vector = match provider {
        None => None,
        Some(provider) => match provider.embed(query) {
            Ok(vector) if is_valid_vector(&vector, dimension) => Some(vector),
            Ok(vector) => {
                tracing::warn!(
                    "{} returned {} values for the query (expected {}); lexical results only",
                    provider.name(),
                    vector.len(),
                    dimension
                );
                degraded = true;
                None
            }
            Err(e) => {
                tracing::warn!("Query embedding failed ({}); lexical results only", e);
                degraded = true;
                None
            }
        },
    };

    let vector_hits = match query_vector {
        // A zero query vector carries no signal
        Some(vector) if vector.iter().any(|x| *x != 0.0) => {
            let candidates = usable_candidates(store.list_vectors(scope)?, dimension);
            vector_hits_from_candidates(&vector, &candidates, dimension, vector_candidates)?
        }
        _ => Vec::new(),
    };

    let lexical_candidates = lexical_hits.len();
    let vector_count = vector_hits.len();
    let results = rank_hybrid(&lexical_hits, &vector_hits, options)?;
    tracing::debug!(
        "query {:?}: {} lexical, {} vector, {} ranked",
        query,
        lexical_candidates,
        vector_count,
        results.len()
    );

    Ok(SearchOutcome {
        results,
        degraded,
        lexical_candidates,
        vector_candidates: vector_count,
    })
}

/// Drop stored vectors that no longer fit `dimension`
///
/// They are left over from a different `embedding_dim` and get recomputed
/// by the next index refresh; until then the entry ranks on keywords only.
fn usable_candidates<M>(
    mut candidates: Vec<VectorCandidate<M>>,
    dimension: usize,
) -> Vec<VectorCandidate<M>> {
    let mut dropped = 0;
    for candidate in &mut candidates {
        if matches!(&candidate.vector, Some(v) if !is_valid_vector(v, dimension)) {
            candidate.vector = None;
            dropped += 1;
        }
    }
    if dropped > 0 {
        tracing::warn!(
            "{} stored embeddings do not have {} dimensions; run `recall index`",
            dropped,
            dimension
        );
    }
    candidates
}

/// Search engine combining the entry store and an embedding provider
pub struct SearchEngine {
    store: EntryStore,
    provider: Arc<dyn EmbeddingProvider>,
    coordinator: EmbeddingCoordinator,
    config: SearchConfig,
    entries_dir: PathBuf,
}

impl SearchEngine {
    /// Open the workspace database with the local provider
    pub fn open(paths: &RecallPaths, config: SearchConfig) -> Result<Self> {
        let store = EntryStore::open(&paths.db)?;
        let provider = HarmonicEmbedder::new(config.embedding_dim)
            .context("Failed to create embedding provider")?;
        let entries_dir = paths.entries_dir(&config.entries_dir);
        Self::with_parts(store, Arc::new(provider), config, entries_dir)
    }

    /// Assemble from parts; provider and config must agree on the dimension
    pub fn with_parts(
        store: EntryStore,
        provider: Arc<dyn EmbeddingProvider>,
        config: SearchConfig,
        entries_dir: PathBuf,
    ) -> Result<Self> {
        config.validate()?;
        if provider.dimension() != config.embedding_dim {
            bail!(
                "Provider '{}' produces {} dimensions but embedding_dim is {}",
                provider.name(),
                provider.dimension(),
                config.embedding_dim
            );
        }

        Ok(Self {
            store,
            provider,
            coordinator: EmbeddingCoordinator::new(),
            config,
            entries_dir,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn entries_dir(&self) -> &Path {
        &self.entries_dir
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Hybrid search; `lexical_only` skips the provider entirely
    pub fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        options: &HybridOptions,
        lexical_only: bool,
    ) -> Result<SearchOutcome<EntryMetadata>> {
        let provider = if lexical_only {
            None
        } else {
            Some(self.provider.as_ref())
        };
        hybrid_search(
            &self.store,
            provider,
            query,
            scope,
            options,
            self.config.embedding_dim,
            self.config.vector_candidates,
        )
    }

    /// Entries most similar to `entry_id`, drawn from `scope`
    pub fn find_similar(
        &self,
        entry_id: &str,
        scope: &SearchScope,
        options: &SimilarityOptions,
    ) -> Result<Vec<RankedResult<EntryMetadata>>> {
        let reference_vector = self
            .store
            .get_vector(entry_id)?
            .map(|(vector, _)| vector)
            .filter(|vector| is_valid_vector(vector, self.config.embedding_dim));
        if reference_vector.is_none() && self.store.get_entry(entry_id)?.is_some() {
            tracing::info!("'{}' has no usable embedding yet; run `recall index`", entry_id);
        }

        let candidates = self.store.list_vectors(scope)?;
        let results = find_similar(
            entry_id,
            reference_vector.as_deref(),
            &candidates,
            options,
            self.config.embedding_dim,
        )?;
        Ok(results)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<EntryMetadata>> {
        self.store.get_entry(id)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        self.store.get_stats()
    }

    pub fn last_full_index(&self) -> Result<Option<i64>> {
        Ok(self
            .store
            .get_meta("last_full_index")?
            .and_then(|v| v.parse().ok()))
    }

    /// Sync the entries dir into the store and refresh embeddings
    ///
    /// `rebuild` drops every stored embedding first.
    pub async fn index_all(&self, rebuild: bool) -> Result<IndexingStats> {
        let start = Instant::now();
        let max_chars = self.config.max_embedding_chars;

        if rebuild {
            let cleared = self.store.clear_embeddings()?;
            tracing::info!("Cleared {} embeddings for rebuild", cleared);
        }

        let entries = collect_all_entries(&self.entries_dir);
        let mut texts: HashMap<String, String> = HashMap::with_capacity(entries.len());
        for entry in &entries {
            let record = self.record_for(entry);
            self.store
                .upsert_entry(&record)
                .with_context(|| format!("Failed to index {}", entry.id))?;
            texts.insert(entry.id.clone(), entry.embedding_text(max_chars));
        }

        let keep: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();
        let pruned = self.store.prune_missing(&keep)?;

        let mut stats = IndexingStats {
            entries: entries.len(),
            pruned,
            ..Default::default()
        };

        let mut plan = Vec::new();
        for state in self.store.embedding_states(&SearchScope::all())? {
            let status = self.coordinator.status(
                &state.content_checksum,
                state.recorded_checksum.as_deref(),
                state.has_usable_vector(self.config.embedding_dim),
            );
            match status {
                EmbeddingStatus::Fresh => stats.fresh += 1,
                _ => {
                    let text = texts.remove(&state.id).unwrap_or_default();
                    plan.push(PlannedEmbedding {
                        id: state.id,
                        checksum: state.content_checksum,
                        text,
                    });
                }
            }
        }

        if !plan.is_empty() {
            tracing::info!("Embedding {} entries with {}", plan.len(), self.provider.name());
        }

        for job in self.run_embeddings(plan).await {
            match job.outcome.into_result() {
                Ok(vector) => {
                    let stored = self.store.upsert_embedding(
                        &job.id,
                        &job.checksum,
                        &vector,
                        self.config.embedding_dim,
                    );
                    match stored {
                        Ok(()) if job.shared => stats.shared += 1,
                        Ok(()) => stats.embedded += 1,
                        Err(e) => {
                            tracing::warn!("{:#}", e);
                            stats.failed += 1;
                        }
                    }
                }
                Err(reason) => {
                    tracing::warn!("Failed to embed {}: {}", job.id, reason);
                    stats.failed += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis();

        self.store.set_meta("indexed_count", &stats.entries.to_string())?;
        self.store
            .set_meta("last_full_index", &chrono::Utc::now().timestamp().to_string())?;

        tracing::info!(
            "Indexed {} entries: {} embedded, {} shared, {} fresh, {} failed, {} pruned",
            stats.entries,
            stats.embedded,
            stats.shared,
            stats.fresh,
            stats.failed,
            stats.pruned
        );

        Ok(stats)
    }

    /// Lifecycle status of every entry in scope
    pub fn embedding_report(&self, scope: &SearchScope) -> Result<EmbeddingReport> {
        let mut report = EmbeddingReport::default();
        for state in self.store.embedding_states(scope)? {
            let status = self.coordinator.status(
                &state.content_checksum,
                state.recorded_checksum.as_deref(),
                state.has_usable_vector(self.config.embedding_dim),
            );
            match status {
                EmbeddingStatus::Missing => report.missing += 1,
                EmbeddingStatus::Fresh => report.fresh += 1,
                EmbeddingStatus::Stale => report.stale += 1,
                EmbeddingStatus::Pending => report.pending += 1,
            }
            report.rows.push(EmbeddingReportRow {
                id: state.id,
                title: state.title,
                status,
            });
        }
        Ok(report)
    }

    /// Run planned computations, at most one per checksum
    ///
    /// Every ticket is taken before any task starts, so entries sharing
    /// content within one run always join the first computation.
    async fn run_embeddings(&self, plan: Vec<PlannedEmbedding>) -> Vec<EmbeddingJob> {
        let tickets: Vec<(PlannedEmbedding, ComputationTicket)> = plan
            .into_iter()
            .map(|item| {
                let ticket = self.coordinator.begin(&item.checksum);
                (item, ticket)
            })
            .collect();

        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_EMBEDDINGS));
        let mut tasks = JoinSet::new();

        for (item, ticket) in tickets {
            match ticket {
                ComputationTicket::Dispatch(guard) => {
                    let provider = Arc::clone(&self.provider);
                    let permits = Arc::clone(&permits);
                    tasks.spawn(async move {
                        let _permit = permits.acquire_owned().await;
                        let PlannedEmbedding { id, checksum, text } = item;
                        let computed =
                            tokio::task::spawn_blocking(move || provider.embed(&text)).await;
                        let result = match computed {
                            Ok(Ok(vector)) => Ok(vector),
                            Ok(Err(e)) => Err(e.to_string()),
                            Err(e) => Err(format!("embedding task failed: {}", e)),
                        };
                        EmbeddingJob {
                            id,
                            checksum,
                            shared: false,
                            outcome: guard.complete(result),
                        }
                    });
                }
                ComputationTicket::Join(attachment) => {
                    tasks.spawn(async move {
                        EmbeddingJob {
                            id: item.id,
                            checksum: item.checksum,
                            shared: true,
                            outcome: attachment.wait().await,
                        }
                    });
                }
            }
        }

        let mut jobs = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::error!("Embedding task panicked: {}", e),
            }
        }
        jobs
    }

    fn record_for(&self, entry: &Entry) -> EntryRecord {
        let path = entry
            .path
            .strip_prefix(&self.entries_dir)
            .unwrap_or(&entry.path)
            .to_string_lossy()
            .to_string();

        EntryRecord {
            id: entry.id.clone(),
            path,
            title: entry.title.clone(),
            kind: entry.kind.as_str().to_string(),
            owner: entry.owner.clone(),
            tags: entry.tags.clone(),
            source: entry.source.clone(),
            body: entry.body.clone(),
            preview: entry.preview(PREVIEW_CHARS),
            content_checksum: entry.checksum(self.config.max_embedding_chars),
            created_at: entry.created.timestamp(),
            updated_at: entry.modified.timestamp(),
        }
    }
}

/// `find_similar` failed because the reference has no stored vector
pub fn is_reference_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RankError>(),
        Some(RankError::ReferenceNotFound(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::{write_entry, EntryKind, NewEntry};
    use crate::search::embedding::ProviderError;
    use crate::search::types::MatchKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const DIM: usize = 384;

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Failed("service unavailable".to_string()))
        }
    }

    struct CountingProvider {
        inner: HarmonicEmbedder,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
    }

    fn config() -> SearchConfig {
        SearchConfig {
            embedding_dim: DIM,
            similarity_threshold: 0.0,
            ..Default::default()
        }
    }

    fn note(
        title: &str,
        kind: EntryKind,
        owner: Option<&str>,
        tags: &[&str],
        body: &str,
    ) -> NewEntry {
        NewEntry {
            title: title.to_string(),
            kind,
            owner: owner.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            source: None,
            body: body.to_string(),
        }
    }

    fn seed(dir: &Path) {
        write_entry(
            dir,
            &note(
                "Machine learning ethics",
                EntryKind::Chat,
                Some("alice"),
                &["ai"],
                "We discussed fairness and bias in machine learning systems.",
            ),
        )
        .unwrap();
        write_entry(
            dir,
            &note(
                "Training neural networks",
                EntryKind::Note,
                Some("alice"),
                &["ai"],
                "Learning rates, machine learning optimizers and gradient descent.",
            ),
        )
        .unwrap();
        write_entry(
            dir,
            &note(
                "Banana bread",
                EntryKind::Note,
                Some("bob"),
                &["cooking"],
                "Bananas, flour, butter and an hour in the oven.",
            ),
        )
        .unwrap();
    }

    fn engine_with(dir: &TempDir, provider: Arc<dyn EmbeddingProvider>) -> SearchEngine {
        SearchEngine::with_parts(
            EntryStore::open_in_memory().unwrap(),
            provider,
            config(),
            dir.path().to_path_buf(),
        )
        .unwrap()
    }

    fn engine(dir: &TempDir) -> SearchEngine {
        engine_with(dir, Arc::new(HarmonicEmbedder::new(DIM).unwrap()))
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let result = SearchEngine::with_parts(
            EntryStore::open_in_memory().unwrap(),
            Arc::new(HarmonicEmbedder::new(32).unwrap()),
            config(),
            dir.path().to_path_buf(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_index_then_search() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);

        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.failed, 0);

        let options = engine.config().hybrid_options();
        let outcome = engine
            .search("machine learning ethics", &SearchScope::all(), &options, false)
            .unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.results[0].id, "machine-learning-ethics");
        assert_eq!(outcome.results[0].match_kind, MatchKind::Both);
        assert!(outcome.results.len() <= options.limit);
        for pair in outcome.results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
    }

    #[tokio::test]
    async fn test_second_index_is_fresh() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);

        engine.index_all(false).await.unwrap();
        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(stats.fresh, 3);
        assert_eq!(stats.embedded, 0);

        let rebuilt = engine.index_all(true).await.unwrap();
        assert_eq!(rebuilt.embedded, 3);
    }

    #[tokio::test]
    async fn test_edit_makes_entry_stale_then_fresh() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        let path = dir.path().join("banana-bread.md");
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("an hour", "fifty minutes")).unwrap();

        // store still holds the old checksum until the next sync
        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(stats.fresh, 2);

        let report = engine.embedding_report(&SearchScope::all()).unwrap();
        assert_eq!(report.fresh, 3);
        assert_eq!(report.stale + report.missing + report.pending, 0);
    }

    #[tokio::test]
    async fn test_duplicate_content_embedded_once() {
        let dir = TempDir::new().unwrap();
        let same = note("Standup", EntryKind::Chat, None, &[], "Nothing new today.");
        write_entry(dir.path(), &same).unwrap();
        write_entry(dir.path(), &same).unwrap();

        let provider = Arc::new(CountingProvider {
            inner: HarmonicEmbedder::new(DIM).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(&dir, provider.clone());

        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.embedded, 1);
        assert_eq!(stats.shared, 1);
        assert_eq!(engine.get_stats().unwrap().embedding_count, 2);
    }

    #[tokio::test]
    async fn test_failed_provider_degrades_search() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine_with(&dir, Arc::new(FailingProvider));

        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.embedded, 0);

        let report = engine.embedding_report(&SearchScope::all()).unwrap();
        assert_eq!(report.missing, 3);

        let options = engine.config().hybrid_options();
        let outcome = engine
            .search("banana bread", &SearchScope::all(), &options, false)
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.vector_candidates, 0);
        assert_eq!(outcome.results[0].id, "banana-bread");
        assert_eq!(outcome.results[0].match_kind, MatchKind::LexicalOnly);
        assert_eq!(outcome.results[0].vector_score, 0.0);
        let expected = outcome.results[0].lexical_score * options.text_weight;
        assert!((outcome.results[0].combined_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_lexical_only_skips_provider() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        let options = engine.config().hybrid_options();
        let outcome = engine
            .search("gradient", &SearchScope::all(), &options, true)
            .unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].match_kind, MatchKind::LexicalOnly);
    }

    #[tokio::test]
    async fn test_scope_and_empty_query() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        let scope = SearchScope {
            owner: Some("bob".to_string()),
            ..Default::default()
        };
        let options = engine.config().hybrid_options();
        let outcome = engine.search("machine learning", &scope, &options, false).unwrap();
        assert!(outcome.results.iter().all(|r| r.metadata.owner.as_deref() == Some("bob")));

        let blank = engine.search("   ", &SearchScope::all(), &options, false).unwrap_err();
        assert_eq!(blank.downcast_ref::<RankError>(), Some(&RankError::EmptyQuery));

        let bad = HybridOptions::new(0.4, 0.4, 10, 0.0);
        assert!(engine.search("bread", &SearchScope::all(), &bad, false).is_err());
    }

    #[tokio::test]
    async fn test_find_similar() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        let options = engine.config().similarity_options();
        let results = engine
            .find_similar("machine-learning-ethics", &SearchScope::all(), &options)
            .unwrap();
        assert!(results.iter().all(|r| r.id != "machine-learning-ethics"));
        assert!(results.iter().all(|r| r.match_kind == MatchKind::VectorOnly));
        assert_eq!(results[0].id, "training-neural-networks");

        let err = engine
            .find_similar("no-such-entry", &SearchScope::all(), &options)
            .unwrap_err();
        assert!(is_reference_not_found(&err));
    }

    #[tokio::test]
    async fn test_single_entry_has_nothing_similar() {
        let dir = TempDir::new().unwrap();
        write_entry(
            dir.path(),
            &note("Solo", EntryKind::Note, None, &[], "The only entry here."),
        )
        .unwrap();
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        let err = engine
            .find_similar("solo", &SearchScope::all(), &SimilarityOptions::new(5, 0.0))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RankError>(),
            Some(&RankError::EmptyCandidatePool)
        );
    }

    #[tokio::test]
    async fn test_changed_dimension_is_recomputed() {
        let dir = TempDir::new().unwrap();
        let db = TempDir::new().unwrap();
        let db_path = db.path().join("index.db");
        seed(dir.path());

        let open_at = |dim: usize| {
            SearchEngine::with_parts(
                EntryStore::open(&db_path).unwrap(),
                Arc::new(HarmonicEmbedder::new(dim).unwrap()),
                SearchConfig {
                    embedding_dim: dim,
                    ..config()
                },
                dir.path().to_path_buf(),
            )
            .unwrap()
        };

        let wide = open_at(DIM);
        wide.index_all(false).await.unwrap();
        drop(wide);

        let narrow = open_at(128);
        let options = narrow.config().hybrid_options();

        // Old vectors are ignored until the refresh, not fatal
        let report = narrow.embedding_report(&SearchScope::all()).unwrap();
        assert_eq!(report.fresh, 0);
        let before = narrow
            .search("machine learning", &SearchScope::all(), &options, false)
            .unwrap();
        assert_eq!(before.vector_candidates, 0);
        assert!(!before.results.is_empty());

        let stats = narrow.index_all(false).await.unwrap();
        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.fresh, 0);

        let after = narrow
            .search("machine learning", &SearchScope::all(), &options, false)
            .unwrap();
        assert!(after.vector_candidates > 0);
        assert_eq!(after.results[0].match_kind, MatchKind::Both);
        assert_eq!(narrow.embedding_report(&SearchScope::all()).unwrap().fresh, 3);
    }

    #[tokio::test]
    async fn test_deleted_file_is_pruned() {
        let dir = TempDir::new().unwrap();
        seed(dir.path());
        let engine = engine(&dir);
        engine.index_all(false).await.unwrap();

        std::fs::remove_file(dir.path().join("banana-bread.md")).unwrap();
        let stats = engine.index_all(false).await.unwrap();
        assert_eq!(stats.pruned, 1);
        assert!(engine.get_entry("banana-bread").unwrap().is_none());
        assert_eq!(engine.get_stats().unwrap().entry_count, 2);
    }
}
