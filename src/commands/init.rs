use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::*;

use recall_search::core::config::SearchConfig;
use recall_search::core::paths::RecallPaths;

pub fn run(root: Option<PathBuf>, force: bool) -> Result<()> {
    let paths = match root {
        Some(root) => RecallPaths::from_root(root),
        None => RecallPaths::discover()?,
    };

    println!("{}", "Recall Workspace".bold());
    println!("{}", "=".repeat(50));
    println!();

    fs::create_dir_all(&paths.data)
        .with_context(|| format!("Failed to create {}", paths.data.display()))?;
    println!("{} {} ready", "✓".green(), paths.data.display());

    let config = if paths.config.exists() && !force {
        let config = SearchConfig::load(&paths.config)?;
        println!("{} {} exists (kept)", "✓".green(), paths.config.display());
        config
    } else {
        let config = SearchConfig::default();
        config.save(&paths.config)?;
        println!("{} Wrote {}", "✓".green(), paths.config.display());
        config
    };

    let entries_dir = paths.entries_dir(&config.entries_dir);
    if entries_dir.exists() {
        println!("{} {} exists", "✓".green(), entries_dir.display());
    } else {
        fs::create_dir_all(&entries_dir)
            .with_context(|| format!("Failed to create {}", entries_dir.display()))?;
        println!("{} Created {}", "✓".green(), entries_dir.display());
    }

    println!();
    println!(
        "Add entries with {} or drop Markdown files into {}, then run {}.",
        "recall add".cyan(),
        entries_dir.display(),
        "recall index".cyan()
    );

    Ok(())
}
