//! Add command - write a new entry file

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use recall_search::core::entry::{write_entry, EntryKind, NewEntry};

use super::open_workspace;

pub struct AddArgs {
    pub file: Option<PathBuf>,
    pub title: String,
    pub kind: String,
    pub owner: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
}

/// Run add command; the body comes from `file` or stdin
pub fn run(root: Option<PathBuf>, args: AddArgs) -> Result<()> {
    let (paths, config) = open_workspace(root)?;

    let body = match &args.file {
        Some(file) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read entry body from stdin")?;
            buf
        }
    };

    let kind: EntryKind = args.kind.parse()?;
    let entry = NewEntry {
        title: args.title,
        kind,
        owner: args.owner,
        tags: args
            .tags
            .iter()
            .map(|t| t.trim_start_matches('#').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        source: args.source,
        body,
    };

    let entries_dir = paths.entries_dir(&config.entries_dir);
    let path = write_entry(&entries_dir, &entry)?;
    tracing::info!("Wrote {}", path.display());

    println!("{} Added {}", "✓".green().bold(), path.display());
    println!(
        "  {} Run {} to make it searchable",
        "→".dimmed(),
        "recall index".cyan()
    );

    Ok(())
}
