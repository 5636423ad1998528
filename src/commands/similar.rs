//! Similar command - "more like this" for one entry

use std::path::PathBuf;

use anyhow::Result;
use colored::*;

use recall_search::search::engine::{is_reference_not_found, SearchEngine};
use recall_search::search::types::SimilarityOptions;

use super::{color_score, open_workspace, scope_from_flags, truncate_display};

pub struct SimilarArgs {
    pub entry: String,
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub owner: Option<String>,
    pub kind: Option<String>,
    pub tag: Option<String>,
    pub json: bool,
}

pub fn run(root: Option<PathBuf>, args: SimilarArgs) -> Result<()> {
    let (paths, config) = open_workspace(root)?;
    let scope = scope_from_flags(args.owner, args.kind, args.tag)?;

    let defaults = config.similarity_options();
    let options = SimilarityOptions::new(
        args.limit.unwrap_or(defaults.limit),
        args.threshold.unwrap_or(defaults.threshold),
    );

    let engine = SearchEngine::open(&paths, config)?;
    let results = match engine.find_similar(&args.entry, &scope, &options) {
        Ok(results) => results,
        Err(e) if is_reference_not_found(&e) && !args.json => {
            eprintln!(
                "{} No embedding for '{}'. Check the id or run {}.",
                "Error:".red().bold(),
                args.entry,
                "recall index".cyan()
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!(
            "{} Nothing above {:.2} similarity to {}",
            "→".dimmed(),
            options.threshold,
            args.entry.cyan()
        );
        return Ok(());
    }

    println!("{} Similar to {}", "→".dimmed(), args.entry.cyan());
    println!();
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            color_score(result.vector_score),
            result.metadata.title.cyan(),
            format!("({})", result.id).dimmed()
        );
        if !result.metadata.preview.is_empty() {
            println!("   {}", truncate_display(&result.metadata.preview, 100).dimmed());
        }
    }

    Ok(())
}
