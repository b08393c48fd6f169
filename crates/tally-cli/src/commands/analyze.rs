//! Analyze command: run the pipeline on one file and save the metrics

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    db::Database,
    detect::DetectOptions,
    models::{NewSalesMetrics, SalesAnalysis},
    reader::read_path,
    AIBackend, AIClient, AnalysisConfig, Error, SalesAnalyzer,
};

use super::format_amount;

/// Switches for `tally analyze`
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    pub no_ai: bool,
    pub no_cache: bool,
    pub dry_run: bool,
    pub json: bool,
}

/// Analyze a file; returns the saved history ID unless this is a dry run
pub async fn cmd_analyze(
    db: &Database,
    user_id: i64,
    file: &Path,
    config: &AnalysisConfig,
    ai: Option<&AIClient>,
    opts: AnalyzeOptions,
) -> Result<Option<i64>> {
    let grid = read_path(file).with_context(|| format!("Failed to read {}", file.display()))?;

    if !opts.json {
        println!("📂 Analyzing {} ({} rows)...", file.display(), grid.len());
        match (ai, opts.no_ai) {
            (_, true) => println!("   AI assist: disabled (--no-ai)"),
            (Some(ai), false) => println!("   🤖 AI assist: {} ({})", ai.backend_name(), ai.host()),
            (None, false) => println!("   💡 Tip: Set OLLAMA_HOST for AI-assisted header detection"),
        }
    }

    let mut analyzer = SalesAnalyzer::new(db, if opts.no_ai { None } else { ai })
        .with_config(config.clone())
        .with_options(DetectOptions {
            use_cache: !opts.no_cache,
            use_model: !opts.no_ai,
        });
    if opts.no_cache {
        analyzer = analyzer.without_cache_write();
    }

    let analysis = match analyzer.analyze(user_id, &grid).await {
        Ok(analysis) => analysis,
        Err(Error::ColumnMismatch {
            headers,
            sales_detected,
            bill_detected,
        }) => {
            eprintln!("❌ Could not match the detected columns against the headers");
            eprintln!("   Sales column detected: '{}'", sales_detected);
            eprintln!("   Bill column detected:  '{}'", bill_detected);
            eprintln!("   Headers:");
            for (i, header) in headers.iter().enumerate() {
                eprintln!("     {:>3}. {}", i, header);
            }
            anyhow::bail!("Column matching failed for {}", file.display());
        }
        Err(e) => return Err(e).context("Analysis failed"),
    };

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let saved_id = if opts.dry_run {
        None
    } else {
        let id = db
            .insert_sales_metrics(&NewSalesMetrics {
                user_id,
                source_type: "file".to_string(),
                file_name: file_name.clone(),
                payload: Some(serde_json::json!({
                    "file_name": file_name,
                    "headers": analysis.headers,
                    "diagnostics": analysis.diagnostics,
                })),
                metrics: analysis.metrics,
            })
            .context("Failed to save metrics")?;
        Some(id)
    };

    if opts.json {
        let output = serde_json::json!({
            "saved_id": saved_id,
            "analysis": analysis,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_analysis(&analysis);
        match saved_id {
            Some(id) => println!("💾 Saved to history (#{})", id),
            None => println!("   (dry run: not saved)"),
        }
    }

    Ok(saved_id)
}

fn print_analysis(analysis: &SalesAnalysis) {
    let m = &analysis.metrics;
    let d = &analysis.diagnostics;

    println!();
    println!("📊 Sales Summary");
    println!("   ─────────────────────────────");
    println!("   Total sales:       {}", format_amount(m.total_sales));
    println!("   Bill rows:         {}", m.bill_row_count);
    println!("   Unique bill IDs:   {}", m.unique_bill_count);
    println!();
    println!("🔍 Detection");
    println!("   Header row:        {}", d.header_row_index);
    println!("   Sales column:      {}", d.sales_column);
    println!("   Bill column:       {}", d.bill_column);
    println!(
        "   Strategy:          {}{}",
        d.strategy,
        if d.used_external_assist { " 🤖" } else { "" }
    );
    println!("   Details:           {}", d.diagnostic_message);
    println!();
    println!("🧹 Cleaning");
    println!("   Blank rows:        {}", d.dropped_blank_rows);
    println!("   Total rows:        {}", d.dropped_totalish_rows);
    println!("   Summary rows:      {}", d.dropped_summary_rows);
    println!("   Missing bill ID:   {}", d.dropped_missing_bill_rows);
    println!("   Rows used:         {}", d.final_rows_used);
    println!();
}
