//! Saved metrics commands

use anyhow::{bail, Result};
use tally_core::{db::Database, models::SalesMetricsRecord, ReportedMetrics};

use super::{format_amount, truncate};

pub fn cmd_history_list(
    db: &Database,
    user_id: i64,
    limit: Option<i64>,
    offset: i64,
) -> Result<Vec<SalesMetricsRecord>> {
    let records = db.list_sales_metrics(user_id, limit, offset)?;

    if records.is_empty() {
        println!("No saved metrics for user {}.", user_id);
        return Ok(records);
    }

    println!(
        "{:>5}  {:<16}  {:<28} {:>14} {:>9} {:>9}",
        "ID", "DATE", "FILE", "TOTAL SALES", "ROWS", "BILLS"
    );
    println!("{}", "-".repeat(88));

    for r in &records {
        println!(
            "{:>5}  {:<16}  {:<28} {:>14} {:>9} {:>9}",
            r.id,
            r.created_at.format("%Y-%m-%d %H:%M"),
            truncate(r.file_name.as_deref().unwrap_or(r.source_type.as_str()), 28),
            format_amount(r.total_sales),
            r.bill_row_count,
            r.unique_bill_count
        );
    }

    Ok(records)
}

pub fn cmd_history_latest(db: &Database, user_id: i64) -> Result<Option<SalesMetricsRecord>> {
    let record = db.latest_sales_metrics(user_id)?;
    match &record {
        Some(r) => print_record(r, false),
        None => println!("No saved metrics for user {}.", user_id),
    }
    Ok(record)
}

pub fn cmd_history_show(db: &Database, user_id: i64, id: i64) -> Result<SalesMetricsRecord> {
    let record = db
        .get_sales_metrics(user_id, id)?
        .ok_or_else(|| anyhow::anyhow!("History entry {} not found", id))?;
    print_record(&record, true);
    Ok(record)
}

/// Save figures reported by hand (explicitly or as free text)
pub fn cmd_history_add(db: &Database, user_id: i64, reported: &ReportedMetrics) -> Result<i64> {
    if !reported.is_explicit() && reported.text.trim().is_empty() {
        bail!("Provide --total, --rows and --unique, or --text");
    }

    let record = reported.to_new_record(user_id);
    let id = db.insert_sales_metrics(&record)?;

    let metrics = record.metrics;
    println!("✓ Saved metrics #{}", id);
    println!(
        "   {} total sales, {} bill rows, {} unique bills",
        format_amount(metrics.total_sales),
        metrics.bill_row_count,
        metrics.unique_bill_count
    );
    Ok(id)
}

fn print_record(r: &SalesMetricsRecord, with_payload: bool) {
    println!();
    println!("📊 Metrics #{}", r.id);
    println!("   ─────────────────────────────");
    if let Some(name) = &r.file_name {
        println!("   File:              {}", name);
    }
    println!("   Source:            {}", r.source_type);
    println!("   Saved:             {}", r.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("   Total sales:       {}", format_amount(r.total_sales));
    println!("   Bill rows:         {}", r.bill_row_count);
    println!("   Unique bill IDs:   {}", r.unique_bill_count);

    if with_payload {
        if let Some(payload) = &r.payload {
            println!();
            println!("--- Payload ---");
            println!(
                "{}",
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            );
        }
    }
    println!();
}
