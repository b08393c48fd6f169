//! Status command: database, config and AI backend

use std::path::Path;

use anyhow::Result;
use tally_core::{config::default_config_path, AIBackend, AIClient, AnalysisConfig};

use super::open_db;

pub async fn cmd_status(
    db_path: &Path,
    no_encrypt: bool,
    config: &AnalysisConfig,
    ai: Option<&AIClient>,
) -> Result<()> {
    use std::fs;
    use tally_core::db::DB_KEY_ENV;

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(stats) = db.stats() {
                    println!();
                    println!("   Cached mappings: {}", stats.mappings);
                    println!("   Saved metrics:   {}", stats.metrics);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    match &config.source {
        Some(path) => println!("   Config: {}", path.display()),
        None => {
            println!("   Config: built-in defaults");
            if let Some(path) = default_config_path() {
                println!("      (override with {})", path.display());
            }
        }
    }
    println!(
        "      preview rows: {}, header letter ratio: {}, sparse summary fields: {}",
        config.preview_rows, config.min_alpha_ratio, config.sparse_summary_max_other_fields
    );

    println!();
    match ai {
        Some(ai) => {
            let healthy = ai.health_check().await;
            println!(
                "   {} AI backend: {} at {} (model {})",
                if healthy { "🤖" } else { "❌" },
                ai.backend_name(),
                ai.host(),
                ai.model()
            );
            if !healthy {
                println!("      Backend is not reachable; detection falls back to heuristics");
            }
        }
        None => {
            println!("   AI backend: not configured");
            println!("      Set OLLAMA_HOST (or AI_BACKEND=openai_compatible) to enable");
        }
    }

    println!();
    Ok(())
}
