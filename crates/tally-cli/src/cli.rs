//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Sales totals from messy exports
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Extract sales totals and bill counts from arbitrary sales exports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Analysis config file (defaults to the user override, then built-in values)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User whose mappings and history are used
    #[arg(long, default_value = "1", global = true)]
    pub user: i64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Analyze a sales export (CSV, XLSX, XLSM or XLS)
    Analyze {
        /// File to analyze
        #[arg(short, long)]
        file: PathBuf,

        /// Don't ask the AI backend to locate the header and columns
        #[arg(long)]
        no_ai: bool,

        /// Neither read nor write the column-mapping cache
        #[arg(long)]
        no_cache: bool,

        /// Don't save the metrics to history
        #[arg(long)]
        dry_run: bool,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decide whether a file is a sales export
    Classify {
        /// File to classify
        #[arg(short, long)]
        file: PathBuf,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage cached column mappings
    Mappings {
        #[command(subcommand)]
        action: Option<MappingsAction>,
    },

    /// Show saved metrics
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,

        /// Number of entries to show (1-100)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of entries to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Show database, config and AI backend status
    Status,
}

#[derive(Subcommand)]
pub enum MappingsAction {
    /// List cached mappings
    List,

    /// Forget the mapping for one file layout
    Forget {
        /// Layout signature (as shown by `tally mappings list`)
        signature: String,
    },

    /// Forget every cached mapping
    Clear,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Show the most recent entry
    Latest,

    /// Show one entry with its stored payload
    Show {
        /// Entry ID
        id: i64,
    },

    /// Record figures reported outside an upload
    ///
    /// Give all of --total, --rows and --unique, or describe the figures in
    /// --text (e.g. "sales 12,400.50 over 38 bills, 31 unique").
    Add {
        /// Total sales
        #[arg(long)]
        total: Option<f64>,

        /// Bill row count
        #[arg(long)]
        rows: Option<usize>,

        /// Unique bill count
        #[arg(long)]
        unique: Option<usize>,

        /// Free text to read the figures from
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (detect_columns, classify_sales)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
