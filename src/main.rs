//! podscribe - Browse and sync a podcast transcript archive

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod browse;
mod catalog;
mod cli;
mod config;
mod manifest;
mod sync;
mod utils;

use cli::commands::SyncArgs;
use cli::{Cli, Commands};
use utils::ConditionalStderrLayer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "podscribe=debug" } else { "podscribe=info" };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(ConditionalStderrLayer::new(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        ))
        .init();

    match cli.command {
        Commands::Setup { force } => {
            cli::commands::setup(force).await?;
        }
        Commands::Sync {
            metadata,
            cache,
            dry_run,
            timestamps,
            no_timestamps,
            descriptions,
        } => {
            let timestamps = match (timestamps, no_timestamps) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cli::commands::sync(SyncArgs {
                root: cli.root,
                metadata,
                cache,
                dry_run,
                timestamps,
                descriptions,
            })
            .await?;
        }
        Commands::List {
            filters,
            page,
            limit,
            json,
        } => {
            cli::commands::list(cli.root, filters, page, limit, json).await?;
        }
        Commands::Pick { filters } => {
            cli::commands::pick(cli.root, filters).await?;
        }
        Commands::Copy { key, stdout, filters } => {
            cli::commands::copy(cli.root, key, stdout, filters).await?;
        }
        Commands::Status => {
            cli::commands::status(cli.root).await?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}
