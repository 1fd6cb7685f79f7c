//! Persistent manifest of processed episodes and their listening state
//!
//! The manifest lives at `<archive root>/.podscribe/manifest.json` and is the
//! only durable record of listening state once the source cache evicts an
//! episode. Entries are keyed by identifier and never removed automatically.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::metadata::ItemMetadata;

const MANIFEST_DIR: &str = ".podscribe";
const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// Path of the manifest file under an archive root
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_DIR).join(MANIFEST_FILE)
}

/// Modification time and size of a cached source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: i64,
    /// Size in bytes
    pub size: u64,
}

impl SourceInfo {
    /// Drop source info that carries no usable modification time
    fn normalize(info: Option<Self>) -> Option<Self> {
        info.filter(|info| info.mtime >= 0)
    }
}

/// Options that affect how a transcript is rendered to markdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Prefix paragraphs with `[hh:mm:ss]` timestamps
    pub timestamps: bool,
    /// Include the episode description below the byline
    pub include_description: bool,
}

/// Record of one episode in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub metadata: Option<ItemMetadata>,
    /// Markdown document path relative to the archive root
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub play_state: Option<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub last_processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_info: Option<SourceInfo>,
    #[serde(default)]
    pub render_options: Option<RenderOptions>,
}

/// The comparable part of an entry; `last_updated_at` is deliberately absent
#[derive(Debug, Clone, Default, PartialEq)]
struct EntryProjection {
    metadata: Option<ItemMetadata>,
    relative_path: Option<String>,
    play_state: Option<String>,
    skip_reason: Option<String>,
    last_processed_at: Option<DateTime<Utc>>,
    source_info: Option<SourceInfo>,
    render_options: Option<RenderOptions>,
}

impl ManifestEntry {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            metadata: None,
            relative_path: None,
            play_state: None,
            skip_reason: None,
            last_processed_at: None,
            last_updated_at: None,
            source_info: None,
            render_options: None,
        }
    }

    fn projection(&self) -> EntryProjection {
        EntryProjection {
            metadata: self.metadata.clone(),
            relative_path: self.relative_path.clone(),
            play_state: self.play_state.clone(),
            skip_reason: self.skip_reason.clone(),
            last_processed_at: self.last_processed_at,
            source_info: SourceInfo::normalize(self.source_info),
            render_options: self.render_options.clone(),
        }
    }

    fn apply(&mut self, next: EntryProjection, now: DateTime<Utc>) {
        self.metadata = next.metadata;
        self.relative_path = next.relative_path;
        self.play_state = next.play_state;
        self.skip_reason = next.skip_reason;
        self.last_processed_at = next.last_processed_at;
        self.source_info = next.source_info;
        self.render_options = next.render_options;
        self.last_updated_at = Some(now);
    }
}

/// Changes to record for one identifier
///
/// Fields left unset keep the entry's current value, except `skip_reason`
/// which is always replaced so a successful pass clears an old failure.
#[derive(Debug, Clone, Default)]
pub struct UpsertPayload {
    pub identifier: String,
    pub metadata: Option<ItemMetadata>,
    pub relative_path: Option<String>,
    pub skip_reason: Option<String>,
    pub processed: bool,
    pub source_info: Option<SourceInfo>,
    pub render_options: Option<RenderOptions>,
}

impl UpsertPayload {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Mark the item as converted during this pass
    pub fn processed(mut self) -> Self {
        self.processed = true;
        self
    }

    pub fn source_info(mut self, info: SourceInfo) -> Self {
        self.source_info = Some(info);
        self
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = Some(options);
        self
    }
}

/// All episodes ever synchronized into an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest format version
    pub version: u32,
    /// Entries keyed by identifier
    pub entries: BTreeMap<String, ManifestEntry>,
    /// When the manifest was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            updated_at: None,
        }
    }
}

impl Manifest {
    /// Load the manifest from an archive root
    ///
    /// A missing, unreadable or malformed manifest yields an empty one; the
    /// problem is logged as a warning rather than returned.
    pub fn load(root: &Path) -> Self {
        let path = manifest_path(root);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No manifest at {}, starting with an empty one", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read manifest {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match Self::parse(&content) {
            Ok(manifest) => {
                debug!(
                    "Loaded manifest with {} entries from {}",
                    manifest.entries.len(),
                    path.display()
                );
                manifest
            }
            Err(e) => {
                warn!("Ignoring unusable manifest {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Manifest is not valid JSON")?;

        let Value::Object(mut object) = value else {
            bail!("Manifest root is not an object");
        };

        let entries = match object.remove("entries") {
            Some(Value::Object(entries)) => entries,
            Some(_) => bail!("Manifest `entries` is not an object"),
            None => bail!("Manifest has no `entries`"),
        };

        let version = object
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(MANIFEST_VERSION);
        if version > MANIFEST_VERSION {
            warn!("Manifest version {} is newer than supported {}", version, MANIFEST_VERSION);
        }

        let updated_at = object
            .remove("updatedAt")
            .and_then(|v| serde_json::from_value(v).ok())
            .flatten();

        let mut manifest = Self {
            version,
            entries: BTreeMap::new(),
            updated_at,
        };

        for (identifier, record) in entries {
            match serde_json::from_value::<ManifestEntry>(record) {
                Ok(mut entry) => {
                    entry.identifier = identifier.clone();
                    manifest.entries.insert(identifier, entry);
                }
                Err(e) => warn!("Skipping malformed manifest entry {}: {}", identifier, e),
            }
        }

        Ok(manifest)
    }

    /// Save the manifest under an archive root, stamping `updated_at`
    pub fn save(&mut self, root: &Path) -> Result<()> {
        let path = manifest_path(root);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create manifest directory {}", parent.display()))?;
        }

        self.version = MANIFEST_VERSION;
        self.updated_at = Some(Utc::now());

        let content = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write manifest to {}", path.display()))?;

        debug!("Saved manifest with {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Option<&ManifestEntry> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update an entry, returning whether anything changed
    pub fn upsert(&mut self, payload: UpsertPayload) -> bool {
        self.upsert_at(payload, Utc::now())
    }

    /// Same as [`Manifest::upsert`] with an explicit clock
    pub fn upsert_at(&mut self, payload: UpsertPayload, now: DateTime<Utc>) -> bool {
        let existing = self.entries.get(&payload.identifier);
        let current = existing.map(ManifestEntry::projection).unwrap_or_default();

        let metadata = payload.metadata.or_else(|| current.metadata.clone());
        let play_state = metadata
            .as_ref()
            .and_then(ItemMetadata::play_state)
            .map(str::to_string)
            .or_else(|| current.play_state.clone());

        let next = EntryProjection {
            metadata,
            relative_path: payload.relative_path.or_else(|| current.relative_path.clone()),
            play_state,
            skip_reason: payload.skip_reason,
            last_processed_at: if payload.processed {
                Some(now)
            } else {
                current.last_processed_at
            },
            source_info: SourceInfo::normalize(payload.source_info.or(current.source_info)),
            render_options: payload.render_options.or_else(|| current.render_options.clone()),
        };

        if existing.is_some() && next == current {
            return false;
        }

        let entry = self
            .entries
            .entry(payload.identifier.clone())
            .or_insert_with(|| ManifestEntry::new(&payload.identifier));
        entry.apply(next, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ListeningStatus;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn with_state(state: &str) -> ItemMetadata {
        ItemMetadata {
            show_title: Some("Hard Fork".to_string()),
            episode_title: Some("The AI Episode".to_string()),
            listening_status: Some(ListeningStatus {
                play_state: Some(state.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn full_payload() -> UpsertPayload {
        UpsertPayload::new("ep-1")
            .metadata(with_state("inProgress"))
            .relative_path("Hard Fork/2024-03-01 The AI Episode.md")
            .source_info(SourceInfo { mtime: 1_700_000_000_000, size: 4096 })
            .render_options(RenderOptions::default())
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut manifest = Manifest::default();
        assert!(manifest.upsert(full_payload()));
        assert!(!manifest.upsert(full_payload()));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_processed_upsert_is_idempotent_at_same_instant() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut manifest = Manifest::default();
        assert!(manifest.upsert_at(full_payload().processed(), now));
        assert!(!manifest.upsert_at(full_payload().processed(), now));
    }

    #[test]
    fn test_unchanged_upsert_keeps_last_updated_at() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let mut manifest = Manifest::default();
        manifest.upsert_at(full_payload(), first);
        manifest.upsert_at(full_payload(), later);
        assert_eq!(manifest.entries["ep-1"].last_updated_at, Some(first));
    }

    #[test]
    fn test_processed_advances_last_processed_at() {
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let mut manifest = Manifest::default();

        manifest.upsert_at(full_payload().processed(), first);
        // A pass that does not convert leaves the processed stamp alone
        assert!(!manifest.upsert_at(full_payload(), later));
        assert_eq!(manifest.entries["ep-1"].last_processed_at, Some(first));

        assert!(manifest.upsert_at(full_payload().processed(), later));
        assert_eq!(manifest.entries["ep-1"].last_processed_at, Some(later));
        assert_eq!(manifest.entries["ep-1"].last_updated_at, Some(later));
    }

    #[test]
    fn test_play_state_follows_listening_status() {
        let mut manifest = Manifest::default();
        manifest.upsert(UpsertPayload::new("ep-1").metadata(with_state("inProgress")));
        assert_eq!(manifest.entries["ep-1"].play_state.as_deref(), Some("inProgress"));

        assert!(manifest.upsert(UpsertPayload::new("ep-1").metadata(with_state("played"))));
        assert_eq!(manifest.entries["ep-1"].play_state.as_deref(), Some("played"));
    }

    #[test]
    fn test_play_state_preserved_without_listening_status() {
        let mut manifest = Manifest::default();
        manifest.upsert(UpsertPayload::new("ep-1").metadata(with_state("played")));

        let mut no_status = with_state("played");
        no_status.listening_status = None;
        assert!(manifest.upsert(UpsertPayload::new("ep-1").metadata(no_status)));
        assert_eq!(manifest.entries["ep-1"].play_state.as_deref(), Some("played"));
    }

    #[test]
    fn test_unset_fields_are_preserved_and_skip_reason_cleared() {
        let mut manifest = Manifest::default();
        manifest.upsert(full_payload().skip_reason("conversion failed"));
        assert!(manifest.upsert(UpsertPayload::new("ep-1")));

        let entry = &manifest.entries["ep-1"];
        assert_eq!(entry.skip_reason, None);
        assert_eq!(entry.relative_path.as_deref(), Some("Hard Fork/2024-03-01 The AI Episode.md"));
        assert!(entry.metadata.is_some());
        assert!(entry.source_info.is_some());
    }

    #[test]
    fn test_identifier_is_stable_across_renames() {
        let mut manifest = Manifest::default();
        manifest.upsert(full_payload());
        assert!(manifest.upsert(UpsertPayload::new("ep-1").relative_path("Hard Fork/renamed.md")));

        assert_eq!(manifest.len(), 1);
        let entry = manifest.get("ep-1").unwrap();
        assert_eq!(entry.identifier, "ep-1");
        assert_eq!(entry.relative_path.as_deref(), Some("Hard Fork/renamed.md"));
    }

    #[test]
    fn test_negative_mtime_is_dropped() {
        let mut manifest = Manifest::default();
        manifest.upsert(UpsertPayload::new("ep-1").source_info(SourceInfo { mtime: -1, size: 10 }));
        assert_eq!(manifest.entries["ep-1"].source_info, None);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::default();
        manifest.upsert(full_payload().processed());

        manifest.save(temp.path()).unwrap();
        assert!(manifest_path(temp.path()).exists());
        assert!(manifest.updated_at.is_some());

        let loaded = Manifest::load(temp.path());
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_saved_schema_is_camel_case() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::default();
        manifest.upsert(full_payload());
        manifest.save(temp.path()).unwrap();

        let raw = std::fs::read_to_string(manifest_path(temp.path())).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["updatedAt"].is_string());
        assert_eq!(value["entries"]["ep-1"]["playState"], "inProgress");
        assert_eq!(value["entries"]["ep-1"]["sourceInfo"]["size"], 4096);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(Manifest::load(temp.path()).is_empty());
    }

    #[test]
    fn test_load_corrupt_or_misshapen_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = manifest_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        for content in ["{not json", "[1, 2, 3]", r#"{"version": 1, "entries": []}"#, r#"{"version": 1}"#] {
            std::fs::write(&path, content).unwrap();
            let manifest = Manifest::load(temp.path());
            assert!(manifest.is_empty(), "expected empty manifest for {content}");
            assert_eq!(manifest.version, MANIFEST_VERSION);
        }
    }

    #[test]
    fn test_oversized_version_does_not_wrap() {
        let manifest = Manifest::parse(r#"{"version": 4294967297, "entries": {}}"#).unwrap();
        assert_eq!(manifest.version, u32::MAX);
    }

    #[test]
    fn test_load_skips_malformed_entries() {
        let temp = TempDir::new().unwrap();
        let path = manifest_path(temp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{
                "version": 1,
                "updatedAt": null,
                "entries": {
                    "good": { "relativePath": "a.md", "playState": "played" },
                    "bad": { "relativePath": 42 }
                }
            }"#,
        )
        .unwrap();

        let manifest = Manifest::load(temp.path());
        assert_eq!(manifest.len(), 1);
        // The key fills in a missing identifier field
        assert_eq!(manifest.entries["good"].identifier, "good");
    }

    #[test]
    fn test_save_fails_when_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("not-a-dir");
        std::fs::write(&root, "").unwrap();

        let mut manifest = Manifest::default();
        assert!(manifest.save(&root).is_err());
    }
}
