//! Recall MCP Server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::config::SearchConfig;
use crate::core::entry::EntryKind;
use crate::core::paths::RecallPaths;
use crate::search::engine::SearchEngine;
use crate::search::error::RankError;
use crate::search::store::SearchScope;
use crate::search::types::SimilarityOptions;
use crate::search::vectordb::EntryMetadata;

const MAX_LIMIT: usize = 100;

/// Parameters for recall_search tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language or keyword query (e.g., "pricing discussion with the vendor")
    #[schemars(description = "Search query")]
    pub query: String,
    #[schemars(description = "Maximum number of results (default: from config)")]
    #[serde(default)]
    pub limit: Option<usize>,
    #[schemars(description = "Only entries from this owner")]
    #[serde(default)]
    pub owner: Option<String>,
    #[schemars(description = "Only entries of this kind: chat, note")]
    #[serde(default)]
    pub kind: Option<String>,
    #[schemars(description = "Only entries carrying this tag")]
    #[serde(default)]
    pub tag: Option<String>,
    #[schemars(description = "Skip the embedding step and rank by keywords only")]
    #[serde(default)]
    pub lexical_only: bool,
}

/// Parameters for recall_similar tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SimilarParams {
    /// Entry id as returned by recall_search (e.g., "chats/2024-03-01-standup")
    #[schemars(description = "Id of the reference entry")]
    pub entry_id: String,
    #[schemars(description = "Maximum number of results (default: from config)")]
    #[serde(default)]
    pub limit: Option<usize>,
    #[schemars(description = "Minimum cosine similarity in [0, 1] (default: from config)")]
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Parameters for recall_get_entry tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetEntryParams {
    #[schemars(description = "Id of the entry to retrieve")]
    pub entry_id: String,
}

/// Search result for JSON output
#[derive(Debug, Serialize)]
struct SearchResultJson {
    id: String,
    title: String,
    path: String,
    kind: String,
    owner: Option<String>,
    tags: Vec<String>,
    preview: String,
    score: f64,
    lexical_score: f64,
    vector_score: f64,
    match_kind: String,
}

impl SearchResultJson {
    fn new(
        id: String,
        meta: EntryMetadata,
        score: f64,
        lexical_score: f64,
        vector_score: f64,
        match_kind: &str,
    ) -> Self {
        Self {
            id,
            title: meta.title,
            path: meta.path,
            kind: meta.kind,
            owner: meta.owner,
            tags: meta.tags,
            preview: meta.preview,
            score,
            lexical_score,
            vector_score,
            match_kind: match_kind.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchResponseJson {
    query: String,
    degraded: bool,
    results: Vec<SearchResultJson>,
}

/// Recall MCP Service
#[derive(Clone)]
pub struct RecallService {
    paths: RecallPaths,
    config: SearchConfig,
    tool_router: ToolRouter<Self>,
}

impl RecallService {
    pub fn new(paths: RecallPaths, config: SearchConfig) -> Self {
        Self {
            paths,
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn get_engine(&self) -> Result<SearchEngine, McpError> {
        SearchEngine::open(&self.paths, self.config.clone())
            .map_err(|e| McpError::internal_error(format!("Failed to open index: {:#}", e), None))
    }
}

/// Invalid caller input is `invalid_params`, everything else `internal_error`
fn to_mcp_error(context: &str, err: anyhow::Error) -> McpError {
    match err.downcast_ref::<RankError>() {
        Some(rank) => McpError::invalid_params(format!("{}: {}", context, rank), None),
        None => McpError::internal_error(format!("{}: {:#}", context, err), None),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

fn clamp_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_LIMIT)
}

#[tool_router]
impl RecallService {
    /// Hybrid keyword + semantic search
    #[tool(description = "Search conversational entries (chats, notes) by keywords and meaning. Results combine full-text and embedding similarity; `degraded: true` means only keyword matching was available.")]
    async fn recall_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let engine = self.get_engine()?;

        let kind = params
            .kind
            .as_deref()
            .map(|k| k.parse::<EntryKind>())
            .transpose()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        let scope = SearchScope {
            owner: params.owner,
            kind,
            tag: params.tag.map(|t| t.to_lowercase()),
        };

        let mut options = self.config.hybrid_options();
        options.limit = clamp_limit(params.limit, options.limit);

        let outcome = engine
            .search(&params.query, &scope, &options, params.lexical_only)
            .map_err(|e| to_mcp_error("Search failed", e))?;

        let response = SearchResponseJson {
            query: params.query,
            degraded: outcome.degraded,
            results: outcome
                .results
                .into_iter()
                .map(|r| {
                    SearchResultJson::new(
                        r.id,
                        r.metadata,
                        r.combined_score,
                        r.lexical_score,
                        r.vector_score,
                        r.match_kind.as_str(),
                    )
                })
                .collect(),
        };
        to_json(&response)
    }

    /// Entries most similar to one entry
    #[tool(description = "Find entries similar in meaning to a given entry (\"more like this\"). Use an id returned by recall_search.")]
    async fn recall_similar(
        &self,
        params: Parameters<SimilarParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = params.0;
        let engine = self.get_engine()?;

        let defaults = self.config.similarity_options();
        let options = SimilarityOptions::new(
            clamp_limit(params.limit, defaults.limit),
            params.threshold.unwrap_or(defaults.threshold),
        );

        let results = engine
            .find_similar(&params.entry_id, &SearchScope::all(), &options)
            .map_err(|e| to_mcp_error("Similarity search failed", e))?;

        let json: Vec<SearchResultJson> = results
            .into_iter()
            .map(|r| {
                SearchResultJson::new(
                    r.id,
                    r.metadata,
                    r.vector_score,
                    0.0,
                    r.vector_score,
                    r.match_kind.as_str(),
                )
            })
            .collect();
        to_json(&json)
    }

    /// Get full content of one entry
    #[tool(description = "Get the full text and metadata of one entry by id.")]
    async fn recall_get_entry(
        &self,
        params: Parameters<GetEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        let engine = self.get_engine()?;
        let entry_id = &params.0.entry_id;

        let Some(meta) = engine
            .get_entry(entry_id)
            .map_err(|e| to_mcp_error("Lookup failed", e))?
        else {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "Entry not found: {}",
                entry_id
            ))]));
        };

        let file = engine.entries_dir().join(&meta.path);
        let content = std::fs::read_to_string(&file).map_err(|e| {
            McpError::internal_error(format!("Failed to read entry: {}", e), None)
        })?;

        let metadata = serde_json::to_string_pretty(&meta).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;
        let output = format!(
            "## Metadata\n```json\n{}\n```\n\n## Content\n{}",
            metadata, content
        );
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Index and embedding status
    #[tool(description = "Get index statistics and embedding freshness (fresh, stale, missing) for the workspace.")]
    async fn recall_status(&self) -> Result<CallToolResult, McpError> {
        let engine = self.get_engine()?;
        let stats = engine
            .get_stats()
            .map_err(|e| to_mcp_error("Status failed", e))?;
        let report = engine
            .embedding_report(&SearchScope::all())
            .map_err(|e| to_mcp_error("Status failed", e))?;

        to_json(&serde_json::json!({
            "entry_count": stats.entry_count,
            "embedding_count": stats.embedding_count,
            "last_indexed": stats.last_indexed,
            "provider": engine.provider_name(),
            "embeddings": {
                "fresh": report.fresh,
                "stale": report.stale,
                "missing": report.missing,
                "pending": report.pending,
            },
        }))
    }
}

#[tool_handler]
impl ServerHandler for RecallService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Recall MCP Server. Hybrid keyword + semantic search over conversational entries. Run `recall index` to refresh the index.".to_string()
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server on stdio
pub async fn run_mcp_server(paths: RecallPaths) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let config = SearchConfig::load(&paths.config)?;
    tracing::info!("Serving {} over stdio", paths.root.display());

    let service = RecallService::new(paths, config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
