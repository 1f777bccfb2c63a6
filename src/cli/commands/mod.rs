//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod parse_date;
mod replay;
mod scrape;
mod sources;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::helpers::load_config;

#[derive(Parser)]
#[command(name = "event-scrape")]
#[command(about = "Extract event listings from JavaScript-rendered pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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
    /// Scrape one or more sources with a Chromium browser
    Scrape {
        /// Source IDs to scrape (can specify multiple, or use --all)
        source_ids: Vec<String>,
        /// Scrape all configured sources
        #[arg(short, long)]
        all: bool,
    },

    /// Run a source's pipeline against saved HTML snapshots
    Replay {
        /// Source ID whose rules are applied
        source_id: String,
        /// Rendered HTML files, one per reveal step or page, in order
        #[arg(required = true)]
        html: Vec<PathBuf>,
        /// Output file (defaults to the source's configured output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Detail page snapshot as URL=FILE (repeatable)
        #[arg(short, long = "detail", value_name = "URL=FILE")]
        details: Vec<String>,
    },

    /// List configured sources
    Sources,

    /// Normalize a date string the way date fields are normalized
    ParseDate {
        /// Raw date text
        text: String,
        /// Reference year for dates without one (default: current year)
        #[arg(long)]
        year: Option<i32>,
        /// Read all-numeric dates month-first
        #[arg(long)]
        month_first: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape { source_ids, all } => {
            let config = load_config(cli.config).await?;
            scrape::cmd_scrape(&config, &source_ids, all).await
        }
        Commands::Replay {
            source_id,
            html,
            output,
            details,
        } => {
            let config = load_config(cli.config).await?;
            replay::cmd_replay(&config, &source_id, &html, output, &details).await
        }
        Commands::Sources => {
            let config = load_config(cli.config).await?;
            sources::cmd_sources(&config)
        }
        Commands::ParseDate {
            text,
            year,
            month_first,
        } => parse_date::cmd_parse_date(&text, year, month_first),
    }
}
