//! Archive configuration persistence
//!
//! Stored as JSON in ~/.config/podscribe/config.json. Command-line flags
//! override whatever is loaded here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::catalog::DEFAULT_PAGE_LIMIT;
use crate::manifest::RenderOptions;

/// Persistent archive settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory holding the markdown archive and its manifest
    pub archive_root: PathBuf,
    /// JSON export of live episode metadata
    pub metadata_path: Option<PathBuf>,
    /// Directory of cached source transcripts
    pub cache_dir: Option<PathBuf>,
    /// Rows per page for `list`
    pub page_limit: usize,
    pub render: RenderOptions,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_root: default_archive_root(),
            metadata_path: None,
            cache_dir: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            render: RenderOptions::default(),
        }
    }
}

fn default_archive_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Podscribe")
}

impl ArchiveConfig {
    /// Load the config from its default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save the config to its default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("podscribe").join("config.json"))
    }

    /// Metadata export path, or an error telling the user how to set one
    pub fn require_metadata_path(&self) -> Result<&Path> {
        self.metadata_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No metadata export configured. Run 'podscribe setup' or pass --metadata."))
    }

    pub fn require_cache_dir(&self) -> Result<&Path> {
        self.cache_dir
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No transcript cache configured. Run 'podscribe setup' or pass --cache."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_default() {
        let temp = TempDir::new().unwrap();
        let config = ArchiveConfig::load_from(&temp.path().join("config.json")).unwrap();
        assert_eq!(config, ArchiveConfig::default());
        assert_eq!(config.page_limit, DEFAULT_PAGE_LIMIT);
        assert!(config.archive_root.ends_with("Podscribe"));
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");
        let config = ArchiveConfig {
            archive_root: temp.path().join("archive"),
            metadata_path: Some(temp.path().join("metadata.json")),
            cache_dir: Some(temp.path().join("cache")),
            page_limit: 50,
            render: RenderOptions {
                timestamps: true,
                include_description: false,
            },
        };

        config.save_to(&path).unwrap();
        assert_eq!(ArchiveConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "page_limit": 5 }"#).unwrap();

        let config = ArchiveConfig::load_from(&path).unwrap();
        assert_eq!(config.page_limit, 5);
        assert_eq!(config.metadata_path, None);
        assert!(config.require_metadata_path().is_err());
    }

    #[test]
    fn test_corrupt_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{oops").unwrap();
        assert!(ArchiveConfig::load_from(&path).is_err());
    }
}
