//! Synchronization of cached transcripts into the archive

pub mod converter;
pub mod engine;
pub mod provider;

pub use converter::{DocumentConverter, MarkdownConverter};
pub use engine::{SyncEngine, SyncOptions, SyncResult};
pub use provider::{JsonMetadataProvider, MetadataProvider};
