//! CLI command handlers

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;
use colored::Colorize;
use console::{measure_text_width, truncate_str, Term};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use super::setup::configure;
use super::{Cli, FilterArgs};
use crate::browse;
use crate::catalog::{
    build_catalog_entries, build_filter_config, paginate, query_catalog, resolve_entry, CatalogEntry, FilterConfig,
    Page, PlayState, RawFilterInput,
};
use crate::config::ArchiveConfig;
use crate::manifest::{manifest_path, Manifest};
use crate::sync::{JsonMetadataProvider, MarkdownConverter, SyncEngine, SyncOptions};

const SHOW_COLUMN: usize = 24;

fn archive_root(root: Option<PathBuf>, config: &ArchiveConfig) -> PathBuf {
    root.unwrap_or_else(|| config.archive_root.clone())
}

/// Filtered, sorted catalog plus the size of the unfiltered one
struct Catalog {
    entries: Vec<CatalogEntry>,
    archived: usize,
    filter: FilterConfig,
}

fn load_catalog(root: &Path, filters: FilterArgs) -> Result<Catalog> {
    let filter = build_filter_config(RawFilterInput::from(filters)).context("Invalid filters")?;
    let manifest = Manifest::load(root);
    Ok(Catalog {
        entries: query_catalog(&manifest, root, &filter),
        archived: manifest.len(),
        filter,
    })
}

/// Why a listing came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
enum EmptyReason {
    EmptyArchive,
    NoMatch,
}

impl Catalog {
    fn empty_reason(&self) -> Option<EmptyReason> {
        if !self.entries.is_empty() {
            None
        } else if self.archived == 0 {
            Some(EmptyReason::EmptyArchive)
        } else {
            Some(EmptyReason::NoMatch)
        }
    }
}

/// JSON shape of `list --json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Listing<'a> {
    #[serde(flatten)]
    page: &'a Page<CatalogEntry>,
    filter: String,
    archived: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_reason: Option<EmptyReason>,
}

impl<'a> Listing<'a> {
    fn new(catalog: &Catalog, page: &'a Page<CatalogEntry>) -> Self {
        Self {
            page,
            filter: catalog.filter.summary(),
            archived: catalog.archived,
            empty_reason: catalog.empty_reason(),
        }
    }
}

fn empty_message(catalog: &Catalog) -> Option<String> {
    catalog.empty_reason().map(|reason| match reason {
        EmptyReason::EmptyArchive => "The archive is empty.".to_string(),
        EmptyReason::NoMatch => format!("No episodes match {}", catalog.filter.summary()),
    })
}

/// Explain an empty result; returns true if there was nothing to show
fn report_empty(catalog: &Catalog) -> bool {
    let Some(message) = empty_message(catalog) else {
        return false;
    };
    println!("{}", message.yellow());
    if catalog.empty_reason() == Some(EmptyReason::EmptyArchive) {
        println!("Run {} to convert cached transcripts.", "podscribe sync".cyan());
    }
    true
}

/// Handle the `setup` command
pub async fn setup(force: bool) -> Result<()> {
    println!("{}", "Configuring podscribe...".cyan());

    let config = configure(ArchiveConfig::load()?, force)?;
    let path = config.save()?;

    println!();
    println!("{}", "Configuration saved!".green().bold());
    println!("  Archive:  {}", config.archive_root.display());
    if let Some(metadata) = &config.metadata_path {
        println!("  Metadata: {}", metadata.display());
    }
    if let Some(cache) = &config.cache_dir {
        println!("  Cache:    {}", cache.display());
    }
    println!("  Config:   {}", path.display());

    Ok(())
}

/// Options for the `sync` command
#[derive(Debug, Default)]
pub struct SyncArgs {
    pub root: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub dry_run: bool,
    pub timestamps: Option<bool>,
    pub descriptions: bool,
}

/// Handle the `sync` command
pub async fn sync(args: SyncArgs) -> Result<()> {
    let config = ArchiveConfig::load()?;
    let root = archive_root(args.root, &config);
    let metadata = match args.metadata {
        Some(path) => path,
        None => config.require_metadata_path()?.to_path_buf(),
    };
    let cache = match args.cache {
        Some(path) => path,
        None => config.require_cache_dir()?.to_path_buf(),
    };

    let mut render = config.render.clone();
    if let Some(timestamps) = args.timestamps {
        render.timestamps = timestamps;
    }
    render.include_description |= args.descriptions;

    if args.dry_run {
        println!("{}", "Dry run - nothing will be written.".yellow().bold());
    }
    println!("{} {}", "Syncing into".cyan(), root.display());

    let engine = SyncEngine::new(
        root.clone(),
        cache,
        SyncOptions {
            render,
            dry_run: args.dry_run,
            show_progress: true,
        },
    );
    let result = engine
        .run(&JsonMetadataProvider::new(metadata), &MarkdownConverter)
        .await?;

    println!();
    println!("{}", "Sync complete!".green().bold());
    println!("  Sources:   {}", result.sources);
    println!("  Converted: {}", result.converted);
    println!("  Updated:   {}", result.updated);
    println!("  Unchanged: {}", result.unchanged);
    if result.skipped > 0 {
        println!("  Skipped:   {}", result.skipped.to_string().yellow());
    }
    if result.retained > 0 {
        println!("  Retained:  {} (no longer in the live library)", result.retained);
    }
    if !result.saved && !args.dry_run {
        println!("Manifest already up to date.");
    }

    Ok(())
}

fn format_row(position: usize, entry: &CatalogEntry, width: usize) -> String {
    let date = entry.publish_date.as_deref().unwrap_or("");
    let show = truncate_str(&entry.show_title, SHOW_COLUMN, "…");
    let missing = if entry.has_markdown { "" } else { " ✗" };

    let prefix = format!(
        "{:>4}  {} {:<10}  {:<show_width$}  ",
        position,
        entry.play_state.glyph(),
        date,
        show,
        show_width = SHOW_COLUMN
    );
    let remaining = width
        .saturating_sub(measure_text_width(&prefix) + measure_text_width(missing))
        .max(12);
    let episode = truncate_str(&entry.episode_title, remaining, "…");

    let state = match entry.play_state {
        PlayState::Played => format!("{}{}", prefix, episode).dimmed(),
        PlayState::InProgress => format!("{}{}", prefix, episode).yellow(),
        _ => format!("{}{}", prefix, episode).normal(),
    };
    format!("{}{}", state, missing.red())
}

/// Handle the `list` command
pub async fn list(
    root: Option<PathBuf>,
    filters: FilterArgs,
    page: Option<usize>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = ArchiveConfig::load()?;
    let root = archive_root(root, &config);
    let catalog = load_catalog(&root, filters)?;

    let page = paginate(&catalog.entries, page, limit.or(Some(config.page_limit)));

    if json {
        let out = serde_json::to_string_pretty(&Listing::new(&catalog, &page))
            .context("Failed to serialize listing")?;
        println!("{}", out);
        return Ok(());
    }

    if report_empty(&catalog) {
        return Ok(());
    }

    let (_, columns) = Term::stdout().size();
    let width = usize::from(columns).max(40);

    for (offset, entry) in page.items.iter().enumerate() {
        println!("{}", format_row(page.first_position() + offset, entry, width));
    }

    println!();
    println!(
        "page {}/{} ({} entries{})",
        page.page,
        page.total_pages,
        page.total,
        if catalog.filter.is_unfiltered() {
            String::new()
        } else {
            format!(", {}", catalog.filter.summary())
        }
    );

    Ok(())
}

/// Handle the `pick` command
pub async fn pick(root: Option<PathBuf>, filters: FilterArgs) -> Result<()> {
    let config = ArchiveConfig::load()?;
    let root = archive_root(root, &config);
    let catalog = load_catalog(&root, filters)?;

    if report_empty(&catalog) {
        return Ok(());
    }

    match browse::pick_entry(&catalog.entries, "Pick an episode")? {
        Some(entry) => {
            let path = entry
                .absolute_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("'{}' has no document path", entry.label()))?;
            println!("{}", path.display());
        }
        None => println!("Selection cancelled."),
    }

    Ok(())
}

/// Handle the `copy` command
pub async fn copy(root: Option<PathBuf>, key: Option<String>, stdout: bool, filters: FilterArgs) -> Result<()> {
    let config = ArchiveConfig::load()?;
    let root = archive_root(root, &config);
    let catalog = load_catalog(&root, filters)?;

    if report_empty(&catalog) {
        return Ok(());
    }

    let entry = match key {
        Some(key) => resolve_entry(&catalog.entries, &key)?.clone(),
        None => match browse::pick_entry(&catalog.entries, "Copy an episode")? {
            Some(entry) => entry,
            None => {
                println!("Selection cancelled.");
                return Ok(());
            }
        },
    };

    let path = entry
        .absolute_path
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("'{}' has no document path", entry.label()))?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if stdout {
        print!("{}", text);
        return Ok(());
    }

    let tool = crate::utils::copy_to_clipboard(&text)?;
    println!(
        "{} {} ({} chars via {})",
        "Copied".green().bold(),
        entry.label(),
        text.chars().count(),
        tool
    );

    Ok(())
}

/// Handle the `status` command
pub async fn status(root: Option<PathBuf>) -> Result<()> {
    let config = ArchiveConfig::load()?;
    let root = archive_root(root, &config);
    let path = manifest_path(&root);
    let manifest = Manifest::load(&root);

    println!("{} {}", "Archive:".green().bold(), root.display());
    println!("  Manifest: {}", path.display());

    if manifest.is_empty() {
        println!("  {}", "No podscribe sync history found.".yellow());
        return Ok(());
    }

    let entries = build_catalog_entries(&manifest, &root);
    let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &entries {
        *by_state.entry(entry.play_state.as_str().to_string()).or_default() += 1;
    }

    println!("  Episodes: {}", entries.len());
    for (state, count) in &by_state {
        println!("    {:<12} {}", state, count);
    }

    let missing = entries.iter().filter(|e| !e.has_markdown).count();
    if missing > 0 {
        println!("  Without document: {}", missing.to_string().yellow());
    }
    let skipped = entries.iter().filter(|e| e.skip_reason.is_some()).count();
    if skipped > 0 {
        println!("  Skipped: {}", skipped.to_string().yellow());
    }
    if let Some(updated) = manifest.updated_at {
        println!("  Last sync: {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "podscribe", &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(show: &str, episode: &str, has_markdown: bool) -> CatalogEntry {
        CatalogEntry {
            identifier: "ep-1".to_string(),
            show_title: show.to_string(),
            episode_title: episode.to_string(),
            show_slug: None,
            publisher_title: None,
            publisher_slug: None,
            publish_date: Some("2024-03-01".to_string()),
            relative_path: None,
            absolute_path: None,
            has_markdown,
            play_state: PlayState::Unplayed,
            listening_status: None,
            sort_timestamp: 0,
            skip_reason: None,
        }
    }

    #[test]
    fn test_format_row_truncates_long_titles() {
        colored::control::set_override(false);
        let row = format_row(7, &entry(&"S".repeat(40), &"E".repeat(200), true), 80);
        assert!(row.starts_with("   7  ○ 2024-03-01  "));
        assert!(measure_text_width(&row) <= 80);
        assert!(row.contains('…'));
    }

    #[test]
    fn test_format_row_marks_missing_document() {
        colored::control::set_override(false);
        let row = format_row(1, &entry("Hard Fork", "Robots", false), 80);
        assert!(row.ends_with("Robots ✗"));
    }

    fn catalog(entries: Vec<CatalogEntry>, archived: usize, status: &str) -> Catalog {
        Catalog {
            entries,
            archived,
            filter: build_filter_config(RawFilterInput::Status(status.to_string())).unwrap(),
        }
    }

    #[test]
    fn test_json_listing_echoes_filter_when_nothing_matches() {
        let catalog = catalog(Vec::new(), 3, "played");
        let page = paginate(&catalog.entries, None, None);
        let value = serde_json::to_value(Listing::new(&catalog, &page)).unwrap();

        assert_eq!(value["items"], serde_json::json!([]));
        assert_eq!(value["total"], 0);
        assert_eq!(value["totalPages"], 1);
        assert_eq!(value["filter"], "status=played");
        assert_eq!(value["archived"], 3);
        assert_eq!(value["emptyReason"], "noMatch");
    }

    #[test]
    fn test_json_listing_for_empty_archive() {
        let catalog = catalog(Vec::new(), 0, "all");
        let page = paginate(&catalog.entries, None, None);
        let value = serde_json::to_value(Listing::new(&catalog, &page)).unwrap();
        assert_eq!(value["emptyReason"], "emptyArchive");
    }

    #[test]
    fn test_json_listing_with_results_has_no_reason() {
        let catalog = catalog(vec![entry("Hard Fork", "Robots", true)], 1, "unplayed");
        let page = paginate(&catalog.entries, None, None);
        let value = serde_json::to_value(Listing::new(&catalog, &page)).unwrap();
        assert_eq!(value["items"][0]["identifier"], "ep-1");
        assert_eq!(value["filter"], "status=unplayed");
        assert!(value.get("emptyReason").is_none());
    }

    #[test]
    fn test_empty_messages() {
        assert_eq!(empty_message(&catalog(Vec::new(), 0, "all")).as_deref(), Some("The archive is empty."));
        assert_eq!(
            empty_message(&catalog(Vec::new(), 4, "played")).as_deref(),
            Some("No episodes match status=played")
        );
        assert_eq!(empty_message(&catalog(vec![entry("Hard Fork", "Robots", true)], 1, "all")), None);
    }

    #[test]
    fn test_archive_root_prefers_flag() {
        let config = ArchiveConfig::default();
        assert_eq!(archive_root(Some(PathBuf::from("/x")), &config), PathBuf::from("/x"));
        assert_eq!(archive_root(None, &config), config.archive_root);
    }
}
