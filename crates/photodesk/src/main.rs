//! Photodesk CLI - operator tool for the photo library's ingestion pipeline.
//!
//! Ingests originals from disk into the configured blob store and SQLite
//! database, reprocesses incomplete photos, and inspects what was stored.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a single image or a whole directory
//! photodesk ingest ./shoot/ --uploader alice
//!
//! # Complete every photo left as a draft
//! photodesk reprocess --stale
//!
//! # Inspect a stored photo
//! photodesk show 0b6f1c9e-4a1d-4a8e-9f0e-3e3b2b1f7a10
//!
//! # View configuration
//! photodesk config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Photodesk - photo ingestion pipeline for an admin-managed library.
#[derive(Parser, Debug)]
#[command(name = "photodesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest image files or directories
    Ingest(cli::ingest::IngestArgs),

    /// Regenerate renditions and derived fields from stored originals
    Reprocess(cli::reprocess::ReprocessArgs),

    /// Print a stored photo with its asset, renditions, EXIF and histogram
    Show(cli::show::ShowArgs),

    /// List the distinct capture years in the library
    Years,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't up yet, so config problems go straight to stderr
    let config = match photodesk_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `photodesk config path`."
            );
            photodesk_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Photodesk v{}", photodesk_core::VERSION);

    match cli.command {
        Commands::Ingest(args) => cli::ingest::execute(config, args).await,
        Commands::Reprocess(args) => cli::reprocess::execute(config, args).await,
        Commands::Show(args) => cli::show::execute(config, args).await,
        Commands::Years => cli::years::execute(config).await,
        Commands::Config(args) => cli::config::execute(config, args).await,
    }
}
