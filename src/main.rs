mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use concierge::config::ConciergeConfig;

#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Community assistant: event-aware chat, year-guessing game, daily SMS digest"
)]
struct Cli {
    /// Config file (default: ~/.concierge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Load events from a CSV export into the search index
    Index {
        /// Path to the events CSV
        csv: PathBuf,
    },
    /// Search indexed events
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Text today's event digest
    Notify {
        /// Print the digest instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Check database health and configuration
    Doctor,
    /// Manage stored conversations
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.concierge/models/
    Download,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// Delete expired conversations now
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConciergeConfig::load_from(path)?,
        None => ConciergeConfig::load()?,
    };

    // stdout is reserved for command output
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => concierge::server::serve(config).await?,
        Command::Index { csv } => cli::index::index(&config, &csv).await?,
        Command::Search { query, limit } => cli::search::search(&config, &query, limit).await?,
        Command::Notify { dry_run } => cli::notify::notify(&config, dry_run).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Sessions { action } => match action {
            SessionsAction::Purge => cli::sessions::purge(&config)?,
        },
    }

    Ok(())
}
