//! CLI subcommands

pub mod add;
pub mod index;
pub mod init;
pub mod search;
pub mod similar;
pub mod status;
#[cfg(feature = "watch")]
pub mod watch;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use recall_search::core::config::SearchConfig;
use recall_search::core::entry::EntryKind;
use recall_search::core::paths::RecallPaths;
use recall_search::search::SearchScope;

/// Workspace paths and config for an initialized workspace
pub fn open_workspace(root: Option<PathBuf>) -> Result<(RecallPaths, SearchConfig)> {
    let paths = match root {
        Some(root) => RecallPaths::from_root(root),
        None => RecallPaths::discover()?,
    };
    if !paths.is_initialized() {
        bail!(
            "No workspace at {} (run `recall init` first)",
            paths.root.display()
        );
    }
    let config = SearchConfig::load(&paths.config)?;
    Ok((paths, config))
}

pub fn scope_from_flags(
    owner: Option<String>,
    kind: Option<String>,
    tag: Option<String>,
) -> Result<SearchScope> {
    let kind = kind.map(|k| k.parse::<EntryKind>()).transpose()?;
    Ok(SearchScope {
        owner,
        kind,
        tag: tag.map(|t| t.trim_start_matches('#').to_lowercase()),
    })
}

/// Run an async command body on a fresh runtime
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Cut `s` to at most `max_width` terminal columns, appending "..."
pub fn truncate_display(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(3);
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(c);
    }
    format!("{}...", out.trim_end())
}

pub fn color_score(score: f64) -> colored::ColoredString {
    let text = format!("{:.2}", score);
    if score > 0.8 {
        text.green()
    } else if score > 0.5 {
        text.yellow()
    } else {
        text.dimmed()
    }
}

pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_display_by_width() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("abcdefghijkl", 8), "abcde...");
        // wide characters take two columns
        assert_eq!(truncate_display("한국어테스트입니다", 9), "한국어...");
    }

    #[test]
    fn test_scope_from_flags() {
        let scope = scope_from_flags(
            Some("alice".into()),
            Some("chat".into()),
            Some("#AI".into()),
        )
        .unwrap();
        assert_eq!(scope.owner.as_deref(), Some("alice"));
        assert_eq!(scope.kind, Some(EntryKind::Chat));
        assert_eq!(scope.tag.as_deref(), Some("ai"));

        assert!(scope_from_flags(None, Some("email".into()), None).is_err());
    }
}
