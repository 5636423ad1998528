//! Search configuration, read from `.recall/config.yaml`
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::search::types::{validate_weights, HybridOptions, SimilarityOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Embedding dimension shared by the provider and every stored vector
    pub embedding_dim: usize,
    pub text_weight: f64,
    pub vector_weight: f64,
    pub limit: usize,
    /// Minimum combined score for hybrid results
    pub threshold: f64,
    pub similarity_limit: usize,
    pub similarity_threshold: f64,
    /// How many best vector matches feed the hybrid merge
    pub vector_candidates: usize,
    /// Embedding input is cut to this many characters
    pub max_embedding_chars: usize,
    pub entries_dir: PathBuf,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            text_weight: 0.3,
            vector_weight: 0.7,
            limit: 10,
            threshold: 0.0,
            similarity_limit: 5,
            similarity_threshold: 0.5,
            vector_candidates: 100,
            max_embedding_chars: 8000,
            entries_dir: PathBuf::from("entries"),
        }
    }
}

impl SearchConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            bail!("embedding_dim must be positive");
        }
        validate_weights(self.text_weight, self.vector_weight)?;
        self.hybrid_options().validate()?;
        self.similarity_options().validate()?;
        if self.vector_candidates == 0 {
            bail!("vector_candidates must be at least 1");
        }
        if self.max_embedding_chars == 0 {
            bail!("max_embedding_chars must be at least 1");
        }
        Ok(())
    }

    pub fn hybrid_options(&self) -> HybridOptions {
        HybridOptions::new(self.text_weight, self.vector_weight, self.limit, self.threshold)
    }

    pub fn similarity_options(&self) -> SimilarityOptions {
        SimilarityOptions::new(self.similarity_limit, self.similarity_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SearchConfig::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.text_weight, 0.3);
        assert_eq!(config.vector_weight, 0.7);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "text_weight: 0.5\nvector_weight: 0.5\nlimit: 3\n").unwrap();

        let config = SearchConfig::load(&path).unwrap();
        assert_eq!(config.text_weight, 0.5);
        assert_eq!(config.limit, 3);
        assert_eq!(config.embedding_dim, 384);
    }

    #[test]
    fn test_bad_weights_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "text_weight: 0.4\nvector_weight: 0.4\n").unwrap();

        let err = SearchConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid weights"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.yaml");
        let config = SearchConfig {
            similarity_threshold: 0.25,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SearchConfig::load(&path).unwrap(), config);
    }
}
