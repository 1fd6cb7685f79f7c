//! Interactive configuration prompts

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ArchiveConfig;

fn prompt_path(prompt: &str, current: Option<&Path>) -> Result<PathBuf> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(current) = current {
        input = input.default(current.display().to_string());
    }
    let value = input
        .interact_text()
        .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
    Ok(PathBuf::from(value.trim()))
}

/// Prompt for unset configuration values (all of them with `force`)
pub fn configure(mut config: ArchiveConfig, force: bool) -> Result<ArchiveConfig> {
    if force || !config.archive_root.exists() {
        config.archive_root = prompt_path("Archive directory", Some(&config.archive_root))?;
    }

    if force || config.metadata_path.is_none() {
        config.metadata_path = Some(prompt_path("Metadata export (JSON)", config.metadata_path.as_deref())?);
    }

    if force || config.cache_dir.is_none() {
        config.cache_dir = Some(prompt_path("Transcript cache directory", config.cache_dir.as_deref())?);
    }

    if force {
        config.render.timestamps = Confirm::new()
            .with_prompt("Include paragraph timestamps?")
            .default(config.render.timestamps)
            .interact()
            .context("Failed to read timestamp preference")?;
        config.render.include_description = Confirm::new()
            .with_prompt("Include episode descriptions?")
            .default(config.render.include_description)
            .interact()
            .context("Failed to read description preference")?;
    }

    info!("Archive root: {}", config.archive_root.display());
    Ok(config)
}
