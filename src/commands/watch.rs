//! Watch command - re-index when entry files change

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use recall_search::core::entry::is_entry_file;
use recall_search::search::engine::SearchEngine;

use super::open_workspace;

/// Only Create/Modify/Remove on entry files trigger a refresh
fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| is_entry_file(p))
}

pub fn run(root: Option<PathBuf>, debounce_ms: u64) -> Result<()> {
    let (paths, config) = open_workspace(root)?;
    let engine = SearchEngine::open(&paths, config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let debounce = Duration::from_millis(debounce_ms);

    let stats = runtime.block_on(engine.index_all(false))?;
    println!(
        "{} {} entries indexed, watching {}",
        "✓".green().bold(),
        stats.entries,
        engine.entries_dir().display()
    );

    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    watcher
        .watch(engine.entries_dir(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", engine.entries_dir().display()))?;

    loop {
        let first = match rx.recv() {
            Ok(event) => event,
            // watcher dropped
            Err(_) => break,
        };

        let mut changed = matches!(&first, Ok(event) if is_relevant(event));
        if let Err(e) = &first {
            tracing::warn!("Watch error: {}", e);
        }

        // Collapse a burst of events (editor save = several writes) into one pass
        while let Ok(next) = rx.recv_timeout(debounce) {
            match next {
                Ok(event) => changed |= is_relevant(&event),
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        }

        if !changed {
            continue;
        }

        match runtime.block_on(engine.index_all(false)) {
            Ok(stats) => println!(
                "{} {} embedded, {} pruned, {} failed ({} ms)",
                "→".dimmed(),
                stats.embedded + stats.shared,
                stats.pruned,
                stats.failed,
                stats.duration_ms
            ),
            Err(e) => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
    }

    Ok(())
}
