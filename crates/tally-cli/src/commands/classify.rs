//! Classify command: is this file a sales export?

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{reader::read_path, AIClient, AnalysisConfig, UploadClassifier, Verdict};

use super::format_amount;

pub async fn cmd_classify(
    file: &Path,
    config: &AnalysisConfig,
    ai: Option<&AIClient>,
    json: bool,
) -> Result<Verdict> {
    let grid = read_path(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let verdict = UploadClassifier::new(ai)
        .with_config(config.clone())
        .classify(&grid)
        .await
        .context("Classification failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(verdict);
    }

    match &verdict {
        Verdict::Sales { analysis, .. } => {
            println!("✅ {}: {}", file.display(), verdict.message());
            println!(
                "   {} bill rows, total {}",
                analysis.metrics.bill_row_count,
                format_amount(analysis.metrics.total_sales)
            );
        }
        Verdict::NotSales { .. } => {
            println!("❌ {}: {}", file.display(), verdict.message());
        }
    }

    Ok(verdict)
}
