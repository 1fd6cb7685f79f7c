//! Sources of live episode metadata

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::manifest::MetadataMap;

/// Supplies fresh metadata for the episodes the live source knows about
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self) -> Result<MetadataMap>;
}

/// Reads a JSON export of the form `{ "<identifier>": { ...metadata } }`
pub struct JsonMetadataProvider {
    path: PathBuf,
}

impl JsonMetadataProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MetadataProvider for JsonMetadataProvider {
    async fn fetch(&self) -> Result<MetadataMap> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read metadata export {}", self.path.display()))?;

        let metadata: MetadataMap = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse metadata export {}", self.path.display()))?;

        debug!("Read metadata for {} episodes from {}", metadata.len(), self.path.display());
        Ok(metadata)
    }
}
