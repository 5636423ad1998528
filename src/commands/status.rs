use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use colored::*;
use serde::Serialize;

use recall_search::core::entry::collect_all_entries;
use recall_search::search::engine::{EmbeddingReport, SearchEngine};
use recall_search::search::{EmbeddingStatus, SearchScope};

use super::{format_timestamp, open_workspace, scope_from_flags};

#[derive(Serialize)]
struct WorkspaceStatus {
    timestamp: String,
    root: String,
    entries_dir: String,
    provider: String,
    entries_on_disk: usize,
    entries_indexed: usize,
    embeddings: usize,
    last_indexed: Option<i64>,
    text_weight: f64,
    vector_weight: f64,
    report: EmbeddingReport,
    warnings: Vec<String>,
}

pub fn run(
    root: Option<PathBuf>,
    details: bool,
    owner: Option<String>,
    kind: Option<String>,
    json: bool,
) -> Result<()> {
    let (paths, config) = open_workspace(root)?;
    let scope = if owner.is_some() || kind.is_some() {
        scope_from_flags(owner, kind, None)?
    } else {
        SearchScope::all()
    };

    let text_weight = config.text_weight;
    let vector_weight = config.vector_weight;
    let engine = SearchEngine::open(&paths, config)?;
    let on_disk = collect_all_entries(engine.entries_dir()).len();
    let stats = engine.get_stats()?;
    let report = engine.embedding_report(&scope)?;

    let mut warnings = Vec::new();
    if on_disk != stats.entry_count {
        warnings.push(format!(
            "{} entries on disk, {} indexed (run `recall index`)",
            on_disk, stats.entry_count
        ));
    }
    if report.stale > 0 {
        warnings.push(format!("{} embeddings are stale", report.stale));
    }
    if report.missing > 0 {
        warnings.push(format!("{} entries have no embedding", report.missing));
    }

    let status = WorkspaceStatus {
        timestamp: Local::now().to_rfc3339(),
        root: paths.root.display().to_string(),
        entries_dir: engine.entries_dir().display().to_string(),
        provider: engine.provider_name().to_string(),
        entries_on_disk: on_disk,
        entries_indexed: stats.entry_count,
        embeddings: stats.embedding_count,
        last_indexed: engine.last_full_index()?.or(stats.last_indexed),
        text_weight,
        vector_weight,
        report,
        warnings,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status, details);
    }

    Ok(())
}

fn print_status(status: &WorkspaceStatus, details: bool) {
    println!("{}", "Recall Status".bold());
    println!("{}", "=".repeat(50));
    println!();
    println!("   {:<16} {}", "Root", status.root);
    println!("   {:<16} {}", "Entries dir", status.entries_dir);
    println!("   {:<16} {}", "Provider", status.provider);
    println!(
        "   {:<16} text {:.2} / vector {:.2}",
        "Weights", status.text_weight, status.vector_weight
    );
    if let Some(ts) = status.last_indexed {
        println!("   {:<16} {}", "Last indexed", format_timestamp(ts));
    }
    println!();

    println!("{}", "Entries".cyan());
    println!("{}", "-".repeat(30));
    println!("   {:<12} {:>6}", "On disk", status.entries_on_disk);
    println!("   {:<12} {:>6}", "Indexed", status.entries_indexed);
    println!("   {:<12} {:>6}", "Embeddings", status.embeddings);
    println!();

    let report = &status.report;
    let total = report.rows.len();
    println!("{}", "Embedding lifecycle".cyan());
    println!("{}", "-".repeat(30));
    for (label, count) in [
        ("fresh", report.fresh),
        ("stale", report.stale),
        ("missing", report.missing),
        ("pending", report.pending),
    ] {
        let pct = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("   {:<12} {:>6} ({:.0}%)", label, count, pct);
    }

    if details {
        let needs_work: Vec<_> = report
            .rows
            .iter()
            .filter(|r| r.status != EmbeddingStatus::Fresh)
            .collect();
        if !needs_work.is_empty() {
            println!();
            for row in needs_work {
                let label = format!("{:<8}", row.status.as_str());
                let label = match row.status {
                    EmbeddingStatus::Stale => label.yellow(),
                    EmbeddingStatus::Missing => label.red(),
                    _ => label.normal(),
                };
                println!("   {} {} {}", label, row.id, format!("({})", row.title).dimmed());
            }
        }
    }

    if !status.warnings.is_empty() {
        println!();
        println!("{}", "Needs attention".yellow());
        println!("{}", "-".repeat(30));
        for w in &status.warnings {
            println!("   {}", w);
        }
    }
}
