//! CLI module for podscribe

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::{FilterOptions, RawFilterInput};

pub mod commands;
pub mod setup;

#[derive(Parser, Debug)]
#[command(name = "podscribe", about = "Browse and sync a podcast transcript archive")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Archive root (overrides the configured one)
    #[arg(long, global = true, env = "PODSCRIBE_ROOT")]
    pub root: Option<PathBuf>,
}

/// Filters shared by the browsing commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Play state: all, unplayed, played or in-progress
    #[arg(short, long)]
    pub status: Option<String>,

    /// Fuzzy show filter (repeatable, any may match)
    #[arg(long = "show", value_name = "QUERY")]
    pub shows: Vec<String>,

    /// Fuzzy publisher/station filter (repeatable, any may match)
    #[arg(long = "station", value_name = "QUERY")]
    pub stations: Vec<String>,
}

impl From<FilterArgs> for RawFilterInput {
    fn from(args: FilterArgs) -> Self {
        if args.status.is_none() && args.shows.is_empty() && args.stations.is_empty() {
            return RawFilterInput::Unset;
        }
        RawFilterInput::Options(FilterOptions {
            status: args.status,
            shows: args.shows,
            stations: args.stations,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure archive, metadata export and transcript cache locations
    Setup {
        /// Prompt for every value, not just the missing ones
        #[arg(long)]
        force: bool,
    },

    /// Convert cached transcripts and refresh listening state
    Sync {
        /// JSON export of live episode metadata
        #[arg(long, env = "PODSCRIBE_METADATA")]
        metadata: Option<PathBuf>,

        /// Directory of cached source transcripts
        #[arg(long, env = "PODSCRIBE_CACHE")]
        cache: Option<PathBuf>,

        /// Dry run - report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Prefix paragraphs with timestamps
        #[arg(long, conflicts_with = "no_timestamps")]
        timestamps: bool,

        /// Omit paragraph timestamps
        #[arg(long)]
        no_timestamps: bool,

        /// Include episode descriptions in documents
        #[arg(long)]
        descriptions: bool,
    },

    /// List archived episodes
    List {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page number (1-based)
        #[arg(short, long)]
        page: Option<usize>,

        /// Entries per page
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Pick an episode interactively and print its document path
    Pick {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Copy an episode's transcript to the clipboard
    Copy {
        /// Position in the filtered list or identifier; omit to pick interactively
        key: Option<String>,

        /// Print to stdout instead of the clipboard
        #[arg(long)]
        stdout: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show a summary of the archive manifest
    Status,

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
