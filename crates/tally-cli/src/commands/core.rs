//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve the analysis config
//! - `ai_client` - AI backend from the environment
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{db::Database, AIBackend, AIClient, AnalysisConfig};
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load the analysis config: --config, then the user override, then built-in values
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::load(path).context("Failed to load analysis config")?;
    debug!(source = ?config.source, preview_rows = config.preview_rows, "Loaded analysis config");
    Ok(config)
}

/// AI backend from the environment, bounded by the configured timeout
pub fn ai_client(config: &AnalysisConfig) -> Option<AIClient> {
    let ai = AIClient::from_env()?.with_timeout(config.ai_timeout);
    debug!(backend = ai.backend_name(), host = %ai.host(), model = %ai.model(), "AI backend configured");
    Some(ai)
}

/// Format an amount with two decimals and thousands separators
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (whole, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Analyze an export: tally analyze --file sales.xlsx");
    println!("  2. Review saved totals: tally history");

    Ok(())
}
