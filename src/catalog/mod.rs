//! Catalog projection, filtering and paging

pub mod entry;
pub mod filter;
pub mod fuzzy;
pub mod paginate;

use std::path::Path;

use crate::manifest::Manifest;

pub use entry::{
    build_catalog_entries, build_catalog_entry, resolve_entry, sort_catalog, CatalogEntry, LookupError,
    PlayState,
};
pub use filter::{
    build_filter_config, filter_entries, FilterConfig, FilterErrors, FilterInput, FilterOptions,
    RawFilterInput, StatusFilter,
};
pub use paginate::{paginate, Page, DEFAULT_PAGE_LIMIT};

/// Build, filter and sort the catalog for an archive
pub fn query_catalog(manifest: &Manifest, root: &Path, filter: &FilterConfig) -> Vec<CatalogEntry> {
    let mut entries = filter_entries(&build_catalog_entries(manifest, root), filter);
    sort_catalog(&mut entries);
    entries
}
