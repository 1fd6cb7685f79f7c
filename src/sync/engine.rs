//! Synchronization pass: source cache + live metadata -> manifest and markdown

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::{debug, info, warn};

use super::converter::DocumentConverter;
use super::provider::MetadataProvider;
use crate::manifest::{
    merge_cached_metadata_into_live, ItemMetadata, Manifest, RenderOptions, SourceInfo, UpsertPayload,
};
use crate::utils::{sanitize_filename, title_case_slug};

/// Source transcript extensions picked up from the cache
const SOURCE_EXTENSIONS: &[&str] = &["ttml", "xml", "txt", "vtt"];

/// A transcript file found in the source cache
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub info: SourceInfo,
}

/// Outcome of a synchronization pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Source files found in the cache
    pub sources: usize,
    /// Documents (re)written
    pub converted: usize,
    /// Manifest entries that changed
    pub updated: usize,
    /// Entries seen but unchanged
    pub unchanged: usize,
    /// Sources skipped for missing metadata or failed conversion
    pub skipped: usize,
    /// Identifiers no longer reported live whose cached metadata was reused
    pub retained: usize,
    /// Whether the manifest was written
    pub saved: bool,
}

/// Options for a pass
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub render: RenderOptions,
    /// Compute everything but write nothing
    pub dry_run: bool,
    pub show_progress: bool,
}

/// Reconciles the source cache and live metadata into an archive
pub struct SyncEngine {
    root: PathBuf,
    cache_dir: PathBuf,
    options: SyncOptions,
}

/// Deterministic short suffix used when two episodes want the same file name
fn short_hash(identifier: &str) -> String {
    let digest = Sha256::digest(identifier.as_bytes());
    hex::encode(&digest[..4])
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `<Show>/<YYYY-MM-DD> <Episode>.md`, without a date prefix when undated
fn document_path(identifier: &str, metadata: &ItemMetadata) -> (String, String) {
    let show = non_blank(metadata.show_title.as_deref())
        .map(String::from)
        .or_else(|| non_blank(metadata.show_slug.as_deref()).map(title_case_slug))
        .unwrap_or_else(|| "Unknown Show".to_string());
    let episode = non_blank(metadata.episode_title.as_deref())
        .map(String::from)
        .or_else(|| non_blank(metadata.episode_slug.as_deref()).map(title_case_slug))
        .unwrap_or_else(|| identifier.to_string());

    let stem = match non_blank(metadata.publish_date.as_deref()) {
        Some(date) if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() => format!("{} {}", date, episode),
        _ => episode,
    };

    let folder = Some(sanitize_filename(&show))
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "Unknown Show".to_string());
    let stem = [sanitize_filename(&stem), sanitize_filename(identifier)]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| short_hash(identifier));

    (folder, stem)
}

/// True when `relative` names a location strictly inside the archive root
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Scan the cache for `<identifier>.<ext>` transcripts
pub async fn scan_sources(cache_dir: &Path) -> Result<BTreeMap<String, SourceFile>> {
    let mut sources = BTreeMap::new();

    let mut dir = match fs::read_dir(cache_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Source cache {} does not exist", cache_dir.display());
            return Ok(sources);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read source cache {}", cache_dir.display()));
        }
    };

    while let Some(item) = dir.next_entry().await.context("Failed to list source cache")? {
        let path = item.path();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !extension.is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.as_str())) {
            continue;
        }
        let Some(identifier) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };

        let meta = item
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        if !meta.is_file() {
            continue;
        }
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(-1);

        sources.insert(
            identifier,
            SourceFile {
                path,
                info: SourceInfo {
                    mtime,
                    size: meta.len(),
                },
            },
        );
    }

    debug!("Found {} source transcripts in {}", sources.len(), cache_dir.display());
    Ok(sources)
}

impl SyncEngine {
    pub fn new(root: PathBuf, cache_dir: PathBuf, options: SyncOptions) -> Self {
        Self {
            root,
            cache_dir,
            options,
        }
    }

    /// Pick a relative document path, disambiguating paths owned by other identifiers
    fn claim_path(&self, identifier: &str, metadata: &ItemMetadata, claimed: &mut HashMap<String, String>) -> String {
        let (folder, stem) = document_path(identifier, metadata);
        let mut relative = format!("{}/{}.md", folder, stem);

        if claimed.get(&relative).is_some_and(|owner| owner != identifier) {
            relative = format!("{}/{} [{}].md", folder, stem, short_hash(identifier));
        }

        claimed.insert(relative.clone(), identifier.to_string());
        relative
    }

    fn progress_bar(&self, len: usize) -> Result<ProgressBar> {
        if !self.options.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("=> "),
        );
        Ok(bar)
    }

    async fn convert_one(
        &self,
        source: &SourceFile,
        metadata: &ItemMetadata,
        relative: &str,
        converter: &dyn DocumentConverter,
    ) -> Result<()> {
        let text = fs::read_to_string(&source.path)
            .await
            .with_context(|| format!("Failed to read {}", source.path.display()))?;
        let document = converter.convert(&text, metadata, &self.options.render)?;

        if !is_contained(relative) {
            bail!("Document path {} is outside the archive", relative);
        }

        if self.options.dry_run {
            return Ok(());
        }

        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&target, document)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        debug!("Wrote {}", target.display());
        Ok(())
    }

    async fn remove_stale(&self, relative: &str) {
        if self.options.dry_run {
            return;
        }
        if !is_contained(relative) {
            warn!("Not removing {}: outside the archive", relative);
            return;
        }
        let path = self.root.join(relative);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Removed stale document {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove stale document {}: {}", path.display(), e),
        }
    }

    /// Run one pass and persist the manifest if anything changed
    pub async fn run(
        &self,
        provider: &dyn MetadataProvider,
        converter: &dyn DocumentConverter,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        let mut manifest = Manifest::load(&self.root);

        let mut live = provider.fetch().await.context("Failed to fetch episode metadata")?;
        result.retained = merge_cached_metadata_into_live(&manifest, &mut live);

        let sources = scan_sources(&self.cache_dir).await?;
        result.sources = sources.len();

        let mut claimed: HashMap<String, String> = manifest
            .entries
            .values()
            .filter_map(|e| e.relative_path.clone().map(|p| (p, e.identifier.clone())))
            .collect();

        let progress = self.progress_bar(sources.len())?;
        let mut changed = false;

        for (identifier, source) in &sources {
            progress.set_message(identifier.clone());

            let Some(metadata) = live.get(identifier) else {
                debug!("No metadata for {}, skipping", identifier);
                result.skipped += 1;
                let payload = UpsertPayload::new(identifier.as_str())
                    .source_info(source.info)
                    .skip_reason("missing metadata");
                changed |= self.record(&mut manifest, payload, &mut result);
                progress.inc(1);
                continue;
            };

            let relative = self.claim_path(identifier, metadata, &mut claimed);
            let previous = manifest.get(identifier);
            let previous_path = previous.and_then(|e| e.relative_path.clone());

            let up_to_date = previous.is_some_and(|e| {
                e.last_processed_at.is_some()
                    && e.skip_reason.is_none()
                    && e.source_info == Some(source.info)
                    && e.render_options.as_ref() == Some(&self.options.render)
                    && e.relative_path.as_deref() == Some(relative.as_str())
            }) && self.root.join(&relative).exists();

            let payload = UpsertPayload::new(identifier.as_str())
                .metadata(metadata.clone())
                .source_info(source.info)
                .render_options(self.options.render.clone());

            let payload = if up_to_date {
                payload
            } else {
                match self.convert_one(source, metadata, &relative, converter).await {
                    Ok(()) => {
                        result.converted += 1;
                        if let Some(old) = previous_path.as_deref().filter(|old| *old != relative) {
                            info!("Renamed {} -> {}", old, relative);
                            self.remove_stale(old).await;
                        }
                        payload.relative_path(relative).processed()
                    }
                    Err(e) => {
                        warn!("Failed to convert {}: {:#}", identifier, e);
                        result.skipped += 1;
                        payload.skip_reason(format!("conversion failed: {:#}", e))
                    }
                }
            };

            changed |= self.record(&mut manifest, payload, &mut result);
            progress.inc(1);
        }
        progress.finish_and_clear();

        // Keep listening state fresh for known episodes whose source was evicted
        for (identifier, metadata) in &live {
            if sources.contains_key(identifier) || manifest.get(identifier).is_none() {
                continue;
            }
            let payload = UpsertPayload::new(identifier.as_str()).metadata(metadata.clone());
            changed |= self.record(&mut manifest, payload, &mut result);
        }

        if changed && !self.options.dry_run {
            manifest.save(&self.root)?;
            result.saved = true;
        }

        info!(
            "Sync pass: {} sources, {} converted, {} updated, {} skipped, {} retained",
            result.sources, result.converted, result.updated, result.skipped, result.retained
        );
        Ok(result)
    }

    fn record(&self, manifest: &mut Manifest, payload: UpsertPayload, result: &mut SyncResult) -> bool {
        let changed = manifest.upsert(payload);
        if changed {
            result.updated += 1;
        } else {
            result.unchanged += 1;
        }
        changed
    }
}
