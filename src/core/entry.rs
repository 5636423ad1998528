use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::checksum::{content_checksum, normalize_text};
use super::frontmatter::Frontmatter;

/// File extensions picked up as entries
const ENTRY_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Chat,
    Note,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Note => "note",
        }
    }
}

impl FromStr for EntryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "conversation" => Ok(Self::Chat),
            "note" => Ok(Self::Note),
            other => bail!("Unknown entry kind '{}' (must be: chat|note)", other),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversational entry loaded from disk
#[derive(Debug, Clone)]
pub struct Entry {
    /// Path relative to the entries dir, no extension, `/` separated
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub kind: EntryKind,
    pub owner: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub body: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Entry {
    pub fn load(entries_dir: &Path, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata = fs::metadata(path)?;

        let id = entry_id(entries_dir, path)
            .with_context(|| format!("{} is outside {}", path.display(), entries_dir.display()))?;

        let (frontmatter, body) = Frontmatter::split(&content);
        let frontmatter = frontmatter.unwrap_or_default();

        let modified: DateTime<Utc> = DateTime::from(metadata.modified()?);
        let created = frontmatter
            .created
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| metadata.created().ok().map(DateTime::from))
            .unwrap_or(modified);

        let kind = match frontmatter.kind.as_deref() {
            Some(k) => k.parse().unwrap_or_else(|e| {
                tracing::warn!("{}: {}, treating as note", id, e);
                EntryKind::Note
            }),
            None => EntryKind::Note,
        };

        let title = frontmatter.title.clone().unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&id)
                .to_string()
        });

        Ok(Self {
            id,
            path: path.to_path_buf(),
            title,
            kind,
            owner: frontmatter.owner,
            tags: frontmatter.tags,
            source: frontmatter.source,
            body: body.trim().to_string(),
            created,
            modified,
        })
    }

    /// The text handed to the embedding provider
    pub fn embedding_text(&self, max_chars: usize) -> String {
        normalize_text(&format!("{}\n\n{}", self.title, self.body), max_chars)
    }

    /// Checksum of `embedding_text`
    pub fn checksum(&self, max_chars: usize) -> String {
        content_checksum(&self.embedding_text(max_chars))
    }

    /// Single-line preview of the body
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = normalize_text(&self.body, max_chars + 1);
        if flat.chars().count() > max_chars {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}...", cut.trim_end())
        } else {
            flat
        }
    }
}

/// Entry id for `path` under `entries_dir`
pub fn entry_id(entries_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(entries_dir).ok()?;
    let without_ext = relative.with_extension("");
    let parts: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

pub fn is_entry_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ENTRY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load every entry under `entries_dir`, sorted by id
///
/// Hidden files and directories are skipped. Files that fail to load are
/// logged and skipped. When two files map to one id (`a.md` and `a.txt`),
/// the first path in sort order wins and the other is logged and skipped.
pub fn collect_all_entries(entries_dir: &Path) -> Vec<Entry> {
    if !entries_dir.exists() {
        return Vec::new();
    }

    let mut entries: Vec<Entry> = WalkDir::new(entries_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_entry_file(e.path()))
        .filter_map(|e| match Entry::load(entries_dir, e.path()) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping {}: {:#}", e.path().display(), err);
                None
            }
        })
        .collect();

    entries.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
    entries.dedup_by(|later, kept| {
        let duplicate = later.id == kept.id;
        if duplicate {
            tracing::warn!(
                "Skipping {}: id '{}' is already taken by {}",
                later.path.display(),
                later.id,
                kept.path.display()
            );
        }
        duplicate
    });
    entries
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Fields for a new entry file
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub title: String,
    pub kind: EntryKind,
    pub owner: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub body: String,
}

/// Write `entry` as `<entries_dir>/<slug>.md`, never overwriting
pub fn write_entry(entries_dir: &Path, entry: &NewEntry) -> Result<PathBuf> {
    if entry.body.trim().is_empty() {
        bail!("Entry body is empty");
    }
    fs::create_dir_all(entries_dir)
        .with_context(|| format!("Failed to create {}", entries_dir.display()))?;

    let slug = slugify(&entry.title);
    let mut path = entries_dir.join(format!("{}.md", slug));
    let mut n = 2;
    while path.exists() {
        path = entries_dir.join(format!("{}-{}.md", slug, n));
        n += 1;
    }

    let frontmatter = Frontmatter {
        title: Some(entry.title.clone()),
        kind: Some(entry.kind.to_string()),
        owner: entry.owner.clone(),
        tags: entry.tags.clone(),
        source: entry.source.clone(),
        created: Some(Utc::now().to_rfc3339()),
    };
    let content = format!("{}\n{}\n", frontmatter.render()?, entry.body.trim());
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "entry".to_string()
    } else {
        slug.chars().take(80).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_id() {
        let root = Path::new("/data/entries");
        assert_eq!(
            entry_id(root, Path::new("/data/entries/chats/2024 ethics.md")).as_deref(),
            Some("chats/2024 ethics")
        );
        assert_eq!(entry_id(root, Path::new("/elsewhere/a.md")), None);
    }

    #[test]
    fn test_load_entry_with_frontmatter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ethics.md");
        fs::write(
            &path,
            "---\ntitle: ML ethics\nkind: chat\nowner: alice\ntags: [ai]\ncreated: 2024-03-01\n---\n\nUser: is it fair?\n",
        )
        .unwrap();

        let entry = Entry::load(dir.path(), &path).unwrap();
        assert_eq!(entry.id, "ethics");
        assert_eq!(entry.title, "ML ethics");
        assert_eq!(entry.kind, EntryKind::Chat);
        assert_eq!(entry.owner.as_deref(), Some("alice"));
        assert_eq!(entry.tags, vec!["ai"]);
        assert_eq!(entry.body, "User: is it fair?");
        assert_eq!(entry.created.format("%Y-%m-%d").to_string(), "2024-03-01");
        assert_eq!(entry.embedding_text(8000), "ML ethics User: is it fair?");
    }

    #[test]
    fn test_load_plain_text_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratch.txt");
        fs::write(&path, "some loose thought").unwrap();

        let entry = Entry::load(dir.path(), &path).unwrap();
        assert_eq!(entry.title, "scratch");
        assert_eq!(entry.kind, EntryKind::Note);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_checksum_tracks_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "---\ntitle: A\n---\nfirst").unwrap();
        let before = Entry::load(dir.path(), &path).unwrap().checksum(8000);

        fs::write(&path, "---\ntitle: A\ntags: [new]\n---\nfirst").unwrap();
        let retagged = Entry::load(dir.path(), &path).unwrap().checksum(8000);
        assert_eq!(before, retagged, "tags are not embedded");

        fs::write(&path, "---\ntitle: A\n---\nsecond").unwrap();
        let edited = Entry::load(dir.path(), &path).unwrap().checksum(8000);
        assert_ne!(before, edited);
    }

    #[test]
    fn test_collect_skips_hidden_and_foreign() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("chats")).unwrap();
        fs::create_dir_all(dir.path().join(".recall")).unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("chats/a.md"), "a").unwrap();
        fs::write(dir.path().join(".recall/x.md"), "hidden").unwrap();
        fs::write(dir.path().join("image.png"), "binary").unwrap();

        let entries = collect_all_entries(dir.path());
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "chats/a"]);
    }

    #[test]
    fn test_collect_keeps_one_file_per_id() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "from markdown").unwrap();
        fs::write(dir.path().join("a.txt"), "from text").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let entries = collect_all_entries(dir.path());
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(entries[0].body, "from markdown");
    }

    #[test]
    fn test_write_entry_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let new = NewEntry {
            title: "Chat: Rust & Search!".to_string(),
            kind: EntryKind::Chat,
            owner: None,
            tags: vec!["rust".to_string()],
            source: Some("export.json".to_string()),
            body: "User: hi\nAssistant: hello".to_string(),
        };

        let first = write_entry(dir.path(), &new).unwrap();
        let second = write_entry(dir.path(), &new).unwrap();
        assert_eq!(first.file_name().unwrap(), "chat-rust-search.md");
        assert_eq!(second.file_name().unwrap(), "chat-rust-search-2.md");

        let loaded = Entry::load(dir.path(), &first).unwrap();
        assert_eq!(loaded.title, "Chat: Rust & Search!");
        assert_eq!(loaded.kind, EntryKind::Chat);
        assert_eq!(loaded.source.as_deref(), Some("export.json"));
        assert_eq!(loaded.body, "User: hi\nAssistant: hello");
    }

    #[test]
    fn test_preview() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.md");
        fs::write(&path, "one two three four five").unwrap();
        let entry = Entry::load(dir.path(), &path).unwrap();
        assert_eq!(entry.preview(9), "one two t...");
        assert_eq!(entry.preview(100), "one two three four five");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("Chat".parse::<EntryKind>().unwrap(), EntryKind::Chat);
        assert!("journal".parse::<EntryKind>().is_err());
    }
}
