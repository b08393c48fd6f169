//! Column mapping cache commands

use anyhow::Result;
use tally_core::{db::Database, Signature};

pub fn cmd_mappings_list(db: &Database, user_id: i64) -> Result<()> {
    let mappings = db.list_column_mappings(user_id)?;

    if mappings.is_empty() {
        println!("No cached mappings for user {}.", user_id);
        println!("Mappings are saved after each successful `tally analyze`.");
        return Ok(());
    }

    println!(
        "{:<16} {:>6}  {:<24} {:<20} {:>5}  {}",
        "SIGNATURE", "HEADER", "SALES COLUMN", "BILL COLUMN", "HITS", "UPDATED"
    );
    println!("{}", "-".repeat(96));

    for stored in &mappings {
        println!(
            "{:<16} {:>6}  {:<24} {:<20} {:>5}  {}",
            truncate(stored.signature.as_str(), 16),
            stored.mapping.header_row_index,
            truncate(&stored.mapping.sales_column, 24),
            truncate(&stored.mapping.bill_column, 20),
            stored.hit_count,
            stored.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("{} mapping(s)", mappings.len());
    Ok(())
}

/// Forget one mapping; a signature prefix is accepted when it is unambiguous
pub fn cmd_mappings_forget(db: &Database, user_id: i64, signature: &str) -> Result<()> {
    let matches: Vec<Signature> = db
        .list_column_mappings(user_id)?
        .into_iter()
        .map(|m| m.signature)
        .filter(|s| s.as_str().starts_with(signature))
        .collect();

    let target = match matches.as_slice() {
        [] => anyhow::bail!("No cached mapping matches '{}'", signature),
        [only] => only.clone(),
        _ => anyhow::bail!(
            "'{}' matches {} mappings; use a longer signature",
            signature,
            matches.len()
        ),
    };

    db.delete_column_mapping(user_id, &target)?;
    println!("🗑️  Forgot mapping {}", target);
    Ok(())
}

pub fn cmd_mappings_clear(db: &Database, user_id: i64) -> Result<()> {
    let removed = db.clear_column_mappings(user_id)?;
    println!("🗑️  Removed {} cached mapping(s)", removed);
    Ok(())
}

/// Truncate to `max` characters, marking the cut with an ellipsis
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
