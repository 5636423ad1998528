//! Entry store on SQLite
//!
//! FTS5 provides the lexical score (bm25, title weighted up); embeddings are
//! stored as little-endian f32 BLOBs together with the checksum of the text
//! they were computed from. Similarity is computed in Rust by the caller.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::store::{CandidateStore, SearchScope};
use super::types::{LexicalHit, VectorCandidate};
use super::vector::is_valid_vector;

lazy_static! {
    static ref QUERY_TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}_]+").unwrap();
}

/// Upper bound on rows returned to the ranker per call
const MAX_CANDIDATES: i64 = 10_000;

/// bm25 column weights: entry_id (unindexed), title, body, tags
const BM25_WEIGHTS: &str = "0.0, 10.0, 1.0, 2.0";

const ENTRY_COLUMNS: &str =
    "e.id, e.path, e.title, e.kind, e.owner, e.tags, e.preview, e.created_at, e.updated_at";

const SCOPE_FILTER: &str = r#"
    (?2 IS NULL OR e.owner = ?2)
    AND (?3 IS NULL OR e.kind = ?3)
    AND (?4 IS NULL OR EXISTS (SELECT 1 FROM json_each(e.tags) WHERE json_each.value = ?4))
"#;

/// Display metadata passed through ranking untouched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryMetadata {
    pub title: String,
    pub path: String,
    pub kind: String,
    pub owner: Option<String>,
    pub tags: Vec<String>,
    pub preview: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One entry as written by the indexer
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub id: String,
    pub path: String,
    pub title: String,
    pub kind: String,
    pub owner: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub body: String,
    pub preview: String,
    /// Checksum of the current embedding input
    pub content_checksum: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Embedding bookkeeping for one entry
#[derive(Debug, Clone)]
pub struct EmbeddingState {
    pub id: String,
    pub title: String,
    pub content_checksum: String,
    pub recorded_checksum: Option<String>,
    pub has_vector: bool,
    /// Length of the stored vector, if any
    pub dimension: Option<usize>,
}

impl EmbeddingState {
    /// A stored vector exists and has the expected length
    pub fn has_usable_vector(&self, dimension: usize) -> bool {
        self.has_vector && self.dimension == Some(dimension)
    }
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub entry_count: usize,
    pub embedding_count: usize,
    pub last_indexed: Option<i64>,
}

pub struct EntryStore {
    conn: Connection,
}

impl EntryStore {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                owner TEXT,
                tags TEXT NOT NULL,  -- JSON array
                source TEXT,
                preview TEXT NOT NULL,
                content_checksum TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
                entry_id UNINDEXED,
                title,
                body,
                tags,
                tokenize = 'unicode61 remove_diacritics 2'
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                entry_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                embedded_at INTEGER NOT NULL,
                FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner);
            CREATE INDEX IF NOT EXISTS idx_entries_kind ON entries(kind);
            "#,
        )?;

        Ok(())
    }

    /// Insert or update an entry and its full-text row
    pub fn upsert_entry(&self, entry: &EntryRecord) -> Result<()> {
        let tags_json = serde_json::to_string(&entry.tags)?;
        let now = chrono::Utc::now().timestamp();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO entries (id, path, title, kind, owner, tags, source, preview,
                                 content_checksum, created_at, updated_at, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                title = excluded.title,
                kind = excluded.kind,
                owner = excluded.owner,
                tags = excluded.tags,
                source = excluded.source,
                preview = excluded.preview,
                content_checksum = excluded.content_checksum,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                indexed_at = excluded.indexed_at
            "#,
            params![
                entry.id,
                entry.path,
                entry.title,
                entry.kind,
                entry.owner,
                tags_json,
                entry.source,
                entry.preview,
                entry.content_checksum,
                entry.created_at,
                entry.updated_at,
                now,
            ],
        )?;
        tx.execute("DELETE FROM entries_fts WHERE entry_id = ?1", params![entry.id])?;
        tx.execute(
            "INSERT INTO entries_fts (entry_id, title, body, tags) VALUES (?1, ?2, ?3, ?4)",
            params![entry.id, entry.title, entry.body, entry.tags.join(" ")],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Store the embedding computed from content with `checksum`
    ///
    /// A vector of any length other than `dimension` (or with NaN/Infinity)
    /// is refused rather than padded or cut.
    pub fn upsert_embedding(
        &self,
        id: &str,
        checksum: &str,
        embedding: &[f32],
        dimension: usize,
    ) -> Result<()> {
        if !is_valid_vector(embedding, dimension) {
            bail!(
                "Refusing embedding for '{}': expected {} finite values, got {}",
                id,
                dimension,
                embedding.len()
            );
        }

        self.conn.execute(
            r#"
            INSERT INTO embeddings (entry_id, embedding, dimension, checksum, embedded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entry_id) DO UPDATE SET
                embedding = excluded.embedding,
                dimension = excluded.dimension,
                checksum = excluded.checksum,
                embedded_at = excluded.embedded_at
            "#,
            params![
                id,
                embedding_to_blob(embedding),
                dimension as i64,
                checksum,
                chrono::Utc::now().timestamp(),
            ],
        )
        .with_context(|| format!("Failed to store embedding for '{}'", id))?;

        Ok(())
    }

    /// Delete entry, its text row and its embedding
    pub fn delete_entry(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM embeddings WHERE entry_id = ?1", params![id])?;
        tx.execute("DELETE FROM entries_fts WHERE entry_id = ?1", params![id])?;
        tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    /// Delete every entry whose id is not in `keep`; returns how many went
    pub fn prune_missing(&self, keep: &HashSet<String>) -> Result<usize> {
        let stale: Vec<String> = self
            .all_ids()?
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        for id in &stale {
            self.delete_entry(id)?;
        }
        Ok(stale.len())
    }

    /// Drop every stored embedding (forces full recomputation)
    pub fn clear_embeddings(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM embeddings", [])?)
    }

    pub fn all_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM entries ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Get entry metadata by ID
    pub fn get_entry(&self, id: &str) -> Result<Option<EntryMetadata>> {
        let sql = format!("SELECT {} FROM entries e WHERE e.id = ?1", ENTRY_COLUMNS);
        let result = self
            .conn
            .query_row(&sql, params![id], |row| metadata_from_row(row, 1))
            .optional()?;
        Ok(result)
    }

    /// Stored vector and the checksum it was computed from
    pub fn get_vector(&self, id: &str) -> Result<Option<(Vec<f32>, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT embedding, checksum FROM embeddings WHERE entry_id = ?1",
                params![id],
                |row| {
                    let blob: Vec<u8> = row.get(0)?;
                    let checksum: String = row.get(1)?;
                    Ok((blob_to_embedding(&blob), checksum))
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Content vs. embedding checksums for every entry in scope
    pub fn embedding_states(&self, scope: &SearchScope) -> Result<Vec<EmbeddingState>> {
        let sql = format!(
            r#"
            SELECT e.id, e.title, e.content_checksum, emb.checksum, emb.entry_id IS NOT NULL,
                   emb.dimension
            FROM entries e
            LEFT JOIN embeddings emb ON emb.entry_id = e.id
            WHERE ?1 IS NULL AND {}
            ORDER BY e.id
            "#,
            SCOPE_FILTER
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let (owner, kind, tag) = scope_params(scope);
        let rows = stmt.query_map(
            params![Option::<String>::None, owner, kind, tag],
            |row| {
                Ok(EmbeddingState {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    content_checksum: row.get(2)?,
                    recorded_checksum: row.get(3)?,
                    has_vector: row.get(4)?,
                    dimension: row.get::<_, Option<i64>>(5)?.map(|d| d as usize),
                })
            },
        )?;

        let mut states = Vec::new();
        for row in rows {
            states.push(row?);
        }
        Ok(states)
    }

    /// Get index statistics
    pub fn get_stats(&self) -> Result<IndexStats> {
        let entry_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;

        let embedding_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        let last_indexed: Option<i64> = self
            .conn
            .query_row("SELECT MAX(indexed_at) FROM entries", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(IndexStats {
            entry_count: entry_count as usize,
            embedding_count: embedding_count as usize,
            last_indexed,
        })
    }

    /// Set index metadata
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get index metadata
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(|e| e.into())
    }
}

impl CandidateStore for EntryStore {
    type Metadata = EntryMetadata;

    fn find_lexical_matches(
        &self,
        query: &str,
        scope: &SearchScope,
    ) -> Result<Vec<LexicalHit<EntryMetadata>>> {
        let Some(fts_query) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let sql = format!(
            r#"
            SELECT {columns}, bm25(entries_fts, {weights}) AS rank
            FROM entries_fts
            JOIN entries e ON e.id = entries_fts.entry_id
            WHERE entries_fts MATCH ?1 AND {scope}
            ORDER BY rank, e.id
            LIMIT ?5
            "#,
            columns = ENTRY_COLUMNS,
            weights = BM25_WEIGHTS,
            scope = SCOPE_FILTER,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let (owner, kind, tag) = scope_params(scope);
        let rows = stmt.query_map(
            params![fts_query, owner, kind, tag, MAX_CANDIDATES],
            |row| {
                let rank: f64 = row.get(9)?;
                Ok(LexicalHit {
                    id: row.get(0)?,
                    // bm25 is "lower is better"
                    score: (-rank).max(0.0),
                    metadata: metadata_from_row(row, 1)?,
                })
            },
        )?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        tracing::debug!("{} lexical matches for {:?}", hits.len(), query);
        Ok(hits)
    }

    fn list_vectors(&self, scope: &SearchScope) -> Result<Vec<VectorCandidate<EntryMetadata>>> {
        let sql = format!(
            r#"
            SELECT {columns}, emb.embedding, emb.checksum
            FROM entries e
            LEFT JOIN embeddings emb ON emb.entry_id = e.id
            WHERE ?1 IS NULL AND {scope}
            ORDER BY e.id
            LIMIT ?5
            "#,
            columns = ENTRY_COLUMNS,
            scope = SCOPE_FILTER,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let (owner, kind, tag) = scope_params(scope);
        let rows = stmt.query_map(
            params![Option::<String>::None, owner, kind, tag, MAX_CANDIDATES],
            |row| {
                let blob: Option<Vec<u8>> = row.get(9)?;
                Ok(VectorCandidate {
                    id: row.get(0)?,
                    vector: blob.map(|b| blob_to_embedding(&b)),
                    checksum: row.get(10)?,
                    metadata: metadata_from_row(row, 1)?,
                })
            },
        )?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }
}

fn scope_params(scope: &SearchScope) -> (Option<&str>, Option<&'static str>, Option<String>) {
    (
        scope.owner.as_deref(),
        scope.kind.map(|k| k.as_str()),
        scope.tag.as_ref().map(|t| t.to_lowercase()),
    )
}

/// Metadata columns starting at `offset`, in `ENTRY_COLUMNS` order
fn metadata_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<EntryMetadata> {
    let tags_json: String = row.get(offset + 4)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(EntryMetadata {
        path: row.get(offset)?,
        title: row.get(offset + 1)?,
        kind: row.get(offset + 2)?,
        owner: row.get(offset + 3)?,
        tags,
        preview: row.get(offset + 5)?,
        created_at: row.get(offset + 6)?,
        updated_at: row.get(offset + 7)?,
    })
}

/// User text to an FTS5 query: quoted terms OR-ed together
///
/// Quoting keeps FTS5 operators and punctuation in user input from being
/// parsed as query syntax.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = QUERY_TOKEN_RE
        .find_iter(query)
        .map(|m| format!("\"{}\"", m.as_str()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
