//! Search command - hybrid lexical + vector search

use std::path::PathBuf;

use anyhow::Result;
use colored::*;

use recall_search::search::engine::SearchEngine;
use recall_search::search::types::{HybridOptions, MatchKind};

use super::{color_score, open_workspace, scope_from_flags, truncate_display};

pub struct SearchArgs {
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub text_weight: Option<f64>,
    pub vector_weight: Option<f64>,
    pub owner: Option<String>,
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub lexical: bool,
    pub json: bool,
}

pub fn run(root: Option<PathBuf>, args: SearchArgs) -> Result<()> {
    let (paths, config) = open_workspace(root)?;
    let scope = scope_from_flags(args.owner, args.kind, args.tag)?;

    let defaults = config.hybrid_options();
    let (text_weight, vector_weight) = match (args.text_weight, args.vector_weight) {
        (Some(t), Some(v)) => (t, v),
        (Some(t), None) => (t, 1.0 - t),
        (None, Some(v)) => (1.0 - v, v),
        (None, None) => (defaults.text_weight, defaults.vector_weight),
    };
    let options = HybridOptions::new(
        text_weight,
        vector_weight,
        args.limit.unwrap_or(defaults.limit),
        args.threshold.unwrap_or(defaults.threshold),
    );

    let engine = SearchEngine::open(&paths, config)?;
    let outcome = engine.search(&args.query, &scope, &options, args.lexical)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if outcome.degraded {
        println!(
            "{} Query embedding unavailable, showing keyword matches only",
            "!".yellow()
        );
        println!();
    }

    if outcome.results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), args.query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        outcome.results.len(),
        args.query.cyan()
    );
    println!();

    for (i, result) in outcome.results.iter().enumerate() {
        let meta = &result.metadata;
        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            color_score(result.combined_score),
            meta.title.cyan(),
            format!("({})", result.id).dimmed()
        );
        if !meta.preview.is_empty() {
            println!("   {}", truncate_display(&meta.preview, 100).dimmed());
        }

        let signals = match result.match_kind {
            MatchKind::Both => format!(
                "text {:.2} + vector {:.2}",
                result.lexical_score, result.vector_score
            ),
            MatchKind::LexicalOnly => format!("text {:.2}", result.lexical_score),
            MatchKind::VectorOnly => format!("vector {:.2}", result.vector_score),
            MatchKind::None => "no signal".to_string(),
        };
        let mut line = format!("{} | {}", meta.kind, signals);
        if let Some(owner) = &meta.owner {
            line.push_str(&format!(" | {}", owner));
        }
        if !meta.tags.is_empty() {
            line.push_str(&format!(" | #{}", meta.tags.join(" #")));
        }
        println!("   {}", line);
        println!();
    }

    Ok(())
}
