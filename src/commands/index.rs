//! Index command - sync entries and refresh embeddings

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use recall_search::core::paths::RecallPaths;
use recall_search::search::engine::SearchEngine;
use recall_search::search::SearchScope;

use super::{block_on, format_timestamp, open_workspace};

/// Run index command
pub fn run(root: Option<PathBuf>, status_only: bool, rebuild: bool, json: bool) -> Result<()> {
    let (paths, config) = open_workspace(root)?;

    if status_only {
        return show_status(&paths, &SearchEngine::open(&paths, config)?, json);
    }

    let engine = SearchEngine::open(&paths, config)?;

    if !json {
        println!(
            "{} Indexing {} with {}...",
            "→".dimmed(),
            engine.entries_dir().display(),
            engine.provider_name()
        );
    }

    let stats = block_on(engine.index_all(rebuild))??;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!(
        "{} Indexed {} entries in {:.2}s",
        "✓".green().bold(),
        stats.entries.to_string().cyan(),
        stats.duration_ms as f64 / 1000.0
    );
    println!(
        "  {} {} embedded, {} shared, {} already fresh",
        "→".dimmed(),
        stats.embedded,
        stats.shared,
        stats.fresh
    );
    if stats.pruned > 0 {
        println!("  {} {} removed (file deleted)", "→".dimmed(), stats.pruned);
    }
    if stats.failed > 0 {
        println!(
            "  {} {} entries failed to embed (lexical search still covers them)",
            "✗".red(),
            stats.failed
        );
    }
    println!("  {} Index saved to: {}", "→".dimmed(), paths.db.display());

    Ok(())
}

/// Show index status
fn show_status(paths: &RecallPaths, engine: &SearchEngine, json: bool) -> Result<()> {
    let stats = engine.get_stats()?;
    let report = engine.embedding_report(&SearchScope::all())?;
    let file_size = std::fs::metadata(&paths.db).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "entry_count": stats.entry_count,
                "embedding_count": stats.embedding_count,
                "last_indexed": stats.last_indexed,
                "file_size_bytes": file_size,
                "embeddings": {
                    "fresh": report.fresh,
                    "stale": report.stale,
                    "missing": report.missing,
                    "pending": report.pending,
                },
            })
        );
        return Ok(());
    }

    println!("{}", "Index Status".bold());
    println!();
    println!(
        "  {} {} entries indexed",
        "→".dimmed(),
        stats.entry_count.to_string().cyan()
    );
    println!(
        "  {} {} embeddings ({} fresh, {} stale, {} missing)",
        "→".dimmed(),
        stats.embedding_count.to_string().cyan(),
        report.fresh,
        report.stale,
        report.missing
    );
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        file_size as f64 / 1024.0
    );
    if let Some(ts) = stats.last_indexed {
        println!("  {} Last indexed: {}", "→".dimmed(), format_timestamp(ts));
    }

    Ok(())
}
