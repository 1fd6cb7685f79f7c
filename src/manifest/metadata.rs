//! Episode metadata and listening status as reported by the metadata source

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::Manifest;

/// Listening progress for a single episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListeningStatus {
    /// Raw play state as reported (normally `played`, `inProgress` or `unplayed`)
    pub play_state: Option<String>,
    pub play_count: Option<u32>,
    pub listened_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    /// Fraction of the episode listened to, 0.0 - 1.0
    pub completion_ratio: Option<f64>,
    pub remaining_seconds: Option<f64>,
    pub last_played_at: Option<String>,
}

/// Descriptive metadata for one episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemMetadata {
    pub show_title: Option<String>,
    pub show_slug: Option<String>,
    pub episode_title: Option<String>,
    pub episode_slug: Option<String>,
    /// Publish date, normally `YYYY-MM-DD`
    pub publish_date: Option<String>,
    pub publisher_title: Option<String>,
    pub publisher_slug: Option<String>,
    pub show_description: Option<String>,
    pub episode_description: Option<String>,
    pub listening_status: Option<ListeningStatus>,
}

impl ItemMetadata {
    /// Play state reported by the listening status, if any
    pub fn play_state(&self) -> Option<&str> {
        self.listening_status
            .as_ref()
            .and_then(|status| status.play_state.as_deref())
    }
}

/// Live metadata keyed by identifier
pub type MetadataMap = HashMap<String, ItemMetadata>;

/// Inject cached metadata for identifiers the live source no longer reports
///
/// Entries already present in `live` are left untouched. Returns the number
/// of identifiers that were filled in from the manifest.
pub fn merge_cached_metadata_into_live(manifest: &Manifest, live: &mut MetadataMap) -> usize {
    let mut merged = 0;
    for (identifier, entry) in &manifest.entries {
        if live.contains_key(identifier) {
            continue;
        }
        if let Some(metadata) = &entry.metadata {
            live.insert(identifier.clone(), metadata.clone());
            merged += 1;
        }
    }
    merged
}
