//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{expand_path, Settings};

#[derive(Parser)]
#[command(name = "creel")]
#[command(about = "Lake fishing report acquisition and analysis system")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Scrape fishing reports from the Lake-Link archive
    Scrape {
        /// Max pages to scrape (0 = all)
        #[arg(short, long, default_value = "0")]
        pages: usize,
        /// Delay between page requests in seconds
        #[arg(long)]
        delay: Option<f64>,
        /// Skip authentication (limited to recent reports)
        #[arg(long)]
        no_auth: bool,
        /// Scrape only 5 pages as a sample
        #[arg(long)]
        sample: bool,
    },

    /// Extract structured fields from pending reports
    Process {
        /// Number of concurrent extraction calls
        #[arg(short, long)]
        workers: Option<usize>,
        /// Max reports to process (0 = all)
        #[arg(short, long, default_value = "0")]
        max: usize,
        /// Process only 10 reports as a sample
        #[arg(long)]
        sample: bool,
    },

    /// Show store status
    Status,

    /// Start the query API server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:8000)
        #[arg(default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

/// Parse arguments and dispatch to the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.as_deref().map(expand_path))?;

    match cli.command {
        Commands::Init => commands::init::run(&settings),
        Commands::Scrape {
            pages,
            delay,
            no_auth,
            sample,
        } => commands::scrape::run(&settings, pages, delay, no_auth, sample).await,
        Commands::Process {
            workers,
            max,
            sample,
        } => commands::process::run(&settings, workers, max, sample).await,
        Commands::Status => commands::status::run(&settings),
        Commands::Serve { bind } => commands::serve::run(&settings, &bind).await,
    }
}
