mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemo::config::MnemoConfig;
use mnemo::Importance;

#[derive(Parser)]
#[command(name = "mnemo", version, about = "Bounded, deduplicated semantic memory store")]
struct Cli {
    /// Config file (default: ~/.mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remember a piece of text
    Remember {
        text: String,
        /// low, normal or high
        #[arg(long, default_value = "normal")]
        importance: Importance,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Find the memories most similar to a query
    Recall {
        query: String,
        /// Number of results (default from config)
        #[arg(short, long)]
        k: Option<usize>,
        /// Return every memory at or above this similarity instead of the top k
        #[arg(long, conflicts_with = "k")]
        threshold: Option<f32>,
        /// Only memories carrying this tag (repeatable, any of)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Print a context block of memories relevant to a query
    Context {
        query: String,
        /// Character budget for the whole block
        #[arg(long, default_value_t = 6000)]
        max_chars: usize,
    },
    /// Delete a memory by id
    Forget { id: u64 },
    /// Show one memory
    Show { id: u64 },
    /// List the most recently created memories
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show store statistics
    Stats,
    /// Remove old, low-importance, rarely recalled memories
    Prune {
        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge stored near-duplicates
    Consolidate,
    /// List snapshot backups
    Backups,
    /// Restore a backup (newest if no name is given)
    Restore { name: Option<String> },
    /// Export all memories as JSON to stdout
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MnemoConfig::load_from(path)?,
        None => MnemoConfig::load()?,
    };

    // Log to stderr so stdout stays clean for `export`.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Remember {
            text,
            importance,
            tags,
        } => cli::remember::remember(&config, &text, importance, &tags).await?,
        Command::Recall {
            query,
            k,
            threshold,
            tags,
        } => cli::search::recall(&config, &query, k, threshold, &tags).await?,
        Command::Context { query, max_chars } => {
            cli::search::context(&config, &query, max_chars).await?
        }
        Command::Forget { id } => cli::remember::forget(&config, id).await?,
        Command::Show { id } => cli::remember::show(&config, id).await?,
        Command::List { limit } => cli::search::list(&config, limit).await?,
        Command::Stats => cli::stats::stats(&config).await?,
        Command::Prune { dry_run } => cli::maintenance::prune(&config, dry_run).await?,
        Command::Consolidate => cli::maintenance::consolidate(&config).await?,
        Command::Backups => cli::backup::backups(&config)?,
        Command::Restore { name } => cli::backup::restore(&config, name.as_deref())?,
        Command::Export => cli::export::export(&config).await?,
    }

    Ok(())
}
