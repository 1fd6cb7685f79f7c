//! Manifest persistence and metadata reconciliation

pub mod metadata;
pub mod store;

pub use metadata::{merge_cached_metadata_into_live, ItemMetadata, ListeningStatus, MetadataMap};
pub use store::{manifest_path, Manifest, ManifestEntry, RenderOptions, SourceInfo, UpsertPayload};
