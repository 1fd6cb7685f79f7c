//! Display-ready projection of manifest entries

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::manifest::{ListeningStatus, Manifest, ManifestEntry};
use crate::utils::title_case_slug;

const UNKNOWN_SHOW: &str = "Unknown Show";
const UNKNOWN_EPISODE: &str = "Unknown Episode";

/// Listening completion of an episode
///
/// States the normalizer does not recognise are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayState {
    Played,
    InProgress,
    Unplayed,
    Other(String),
}

impl PlayState {
    /// Normalize a raw play state; a missing state counts as unplayed
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unplayed;
        };

        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "" | "unplayed" | "notplayed" => Self::Unplayed,
            "played" => Self::Played,
            "inprogress" => Self::InProgress,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Played => "played",
            Self::InProgress => "inProgress",
            Self::Unplayed => "unplayed",
            Self::Other(raw) => raw,
        }
    }

    /// Single-character marker used in listings
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Played => "✓",
            Self::InProgress => "◐",
            Self::Unplayed => "○",
            Self::Other(_) => "?",
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlayState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An episode as shown in listings and the picker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub identifier: String,
    pub show_title: String,
    pub episode_title: String,
    pub show_slug: Option<String>,
    pub publisher_title: Option<String>,
    pub publisher_slug: Option<String>,
    pub publish_date: Option<String>,
    pub relative_path: Option<String>,
    pub absolute_path: Option<PathBuf>,
    /// Whether the markdown document existed when the catalog was built
    pub has_markdown: bool,
    pub play_state: PlayState,
    pub listening_status: Option<ListeningStatus>,
    /// Milliseconds since the Unix epoch
    pub sort_timestamp: i64,
    pub skip_reason: Option<String>,
}

impl CatalogEntry {
    /// `Show — Episode` label
    pub fn label(&self) -> String {
        format!("{} — {}", self.show_title, self.episode_title)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve a title: explicit title, title-cased slug, relative path, identifier, sentinel
fn resolve_title(
    title: Option<&str>,
    slug: Option<&str>,
    entry: &ManifestEntry,
    sentinel: &str,
) -> String {
    if let Some(title) = present(title) {
        return title.to_string();
    }
    if let Some(slug) = present(slug) {
        let titled = title_case_slug(slug);
        if !titled.is_empty() {
            return titled;
        }
    }
    present(entry.relative_path.as_deref())
        .or_else(|| present(Some(entry.identifier.as_str())))
        .unwrap_or(sentinel)
        .to_string()
}

/// Parse a strict `YYYY-MM-DD` date as UTC midnight in milliseconds
fn parse_publish_date(date: &str) -> Option<i64> {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

fn sort_timestamp(entry: &ManifestEntry) -> i64 {
    entry
        .metadata
        .as_ref()
        .and_then(|m| present(m.publish_date.as_deref()))
        .and_then(parse_publish_date)
        .or_else(|| entry.last_processed_at.map(|t| t.timestamp_millis()))
        .or_else(|| entry.last_updated_at.map(|t| t.timestamp_millis()))
        .unwrap_or(0)
}

/// Project one manifest entry, probing the filesystem for its document
pub fn build_catalog_entry(entry: &ManifestEntry, root: &Path) -> CatalogEntry {
    let metadata = entry.metadata.as_ref();

    let show_title = resolve_title(
        metadata.and_then(|m| m.show_title.as_deref()),
        metadata.and_then(|m| m.show_slug.as_deref()),
        entry,
        UNKNOWN_SHOW,
    );
    let episode_title = resolve_title(
        metadata.and_then(|m| m.episode_title.as_deref()),
        metadata.and_then(|m| m.episode_slug.as_deref()),
        entry,
        UNKNOWN_EPISODE,
    );

    let absolute_path = present(entry.relative_path.as_deref()).map(|p| root.join(p));
    let has_markdown = absolute_path.as_deref().is_some_and(Path::exists);

    let raw_state = entry
        .play_state
        .as_deref()
        .or_else(|| metadata.and_then(|m| m.play_state()));

    CatalogEntry {
        identifier: entry.identifier.clone(),
        show_title,
        episode_title,
        show_slug: metadata.and_then(|m| m.show_slug.clone()),
        publisher_title: metadata.and_then(|m| m.publisher_title.clone()),
        publisher_slug: metadata.and_then(|m| m.publisher_slug.clone()),
        publish_date: metadata.and_then(|m| m.publish_date.clone()),
        relative_path: entry.relative_path.clone(),
        absolute_path,
        has_markdown,
        play_state: PlayState::normalize(raw_state),
        listening_status: metadata.and_then(|m| m.listening_status.clone()),
        sort_timestamp: sort_timestamp(entry),
        skip_reason: entry.skip_reason.clone(),
    }
}

/// Project every manifest entry in manifest order (not yet sorted)
pub fn build_catalog_entries(manifest: &Manifest, root: &Path) -> Vec<CatalogEntry> {
    manifest
        .entries
        .values()
        .map(|entry| build_catalog_entry(entry, root))
        .collect()
}

/// Newest first, then show, episode and identifier
pub fn compare_entries(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    b.sort_timestamp
        .cmp(&a.sort_timestamp)
        .then_with(|| a.show_title.to_lowercase().cmp(&b.show_title.to_lowercase()))
        .then_with(|| a.episode_title.to_lowercase().cmp(&b.episode_title.to_lowercase()))
        .then_with(|| a.identifier.cmp(&b.identifier))
}

pub fn sort_catalog(entries: &mut [CatalogEntry]) {
    entries.sort_by(compare_entries);
}

/// Failure to resolve an entry without the picker
#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("No episode matches '{0}'")]
    NotFound(String),
    #[error("'{title}' ({identifier}) has no markdown document yet")]
    NotMaterialized { identifier: String, title: String },
}

/// Resolve an entry by identifier or 1-based position
///
/// Only entries whose document exists can be resolved.
pub fn resolve_entry<'a>(entries: &'a [CatalogEntry], key: &str) -> Result<&'a CatalogEntry, LookupError> {
    let key = key.trim();
    let entry = entries
        .iter()
        .find(|e| e.identifier == key)
        .or_else(|| {
            key.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| entries.get(index))
        })
        .ok_or_else(|| LookupError::NotFound(key.to_string()))?;

    if !entry.has_markdown {
        return Err(LookupError::NotMaterialized {
            identifier: entry.identifier.clone(),
            title: entry.label(),
        });
    }
    Ok(entry)
}
