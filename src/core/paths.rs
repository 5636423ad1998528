use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable pointing at the workspace root
pub const ROOT_ENV: &str = "RECALL_ROOT";

const DATA_DIR: &str = ".recall";
const DB_FILE: &str = "search.db";
const CONFIG_FILE: &str = "config.yaml";

/// Filesystem layout of a recall workspace
#[derive(Debug, Clone)]
pub struct RecallPaths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub db: PathBuf,
    pub config: PathBuf,
}

impl RecallPaths {
    /// `$RECALL_ROOT` if set, else the current directory
    pub fn discover() -> Result<Self> {
        if let Some(root) = std::env::var_os(ROOT_ENV) {
            return Ok(Self::from_root(PathBuf::from(root)));
        }
        let root = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::from_root(root))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let data = root.join(DATA_DIR);
        Self {
            db: data.join(DB_FILE),
            config: data.join(CONFIG_FILE),
            data,
            root,
        }
    }

    /// Entries directory, relative paths resolved against the root
    pub fn entries_dir(&self, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.root.join(configured)
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = RecallPaths::from_root(PathBuf::from("/work"));
        assert_eq!(paths.db, PathBuf::from("/work/.recall/search.db"));
        assert_eq!(paths.config, PathBuf::from("/work/.recall/config.yaml"));
        assert_eq!(paths.entries_dir(Path::new("entries")), PathBuf::from("/work/entries"));
        assert_eq!(paths.entries_dir(Path::new("/abs/chats")), PathBuf::from("/abs/chats"));
    }
}
