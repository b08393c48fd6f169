//! Sales metrics history

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewSalesMetrics, SalesMetricsRecord};

/// Page size when none is requested
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
/// Largest page size served
pub const MAX_HISTORY_LIMIT: i64 = 100;

const SELECT_COLUMNS: &str = "SELECT id, user_id, source_type, file_name, payload, total_sales, \
     bill_row_count, unique_bill_count, created_at FROM sales_metrics";

fn row_to_record(row: &Row) -> rusqlite::Result<SalesMetricsRecord> {
    let payload: Option<String> = row.get(4)?;
    let created_at: String = row.get(8)?;
    Ok(SalesMetricsRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        source_type: row.get(2)?,
        file_name: row.get(3)?,
        payload: payload.and_then(|p| serde_json::from_str(&p).ok()),
        total_sales: row.get(5)?,
        bill_row_count: row.get(6)?,
        unique_bill_count: row.get(7)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Persist the figures from one analysis; returns the new row id
    pub fn insert_sales_metrics(&self, new: &NewSalesMetrics) -> Result<i64> {
        let conn = self.conn()?;
        let payload = new.payload.as_ref().map(|p| p.to_string());
        conn.execute(
            r#"
            INSERT INTO sales_metrics
                (user_id, source_type, file_name, payload, total_sales, bill_row_count, unique_bill_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                new.user_id,
                new.source_type,
                new.file_name,
                payload,
                crate::metrics::round2(new.metrics.total_sales),
                new.metrics.bill_row_count as i64,
                new.metrics.unique_bill_count as i64
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest-first page of a user's metrics history
    ///
    /// `limit` is clamped to 1..=100; `None` means 20.
    pub fn list_sales_metrics(
        &self,
        user_id: i64,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<SalesMetricsRecord>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![user_id, limit, offset.max(0)], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// One metrics row, only if it belongs to the user
    pub fn get_sales_metrics(&self, user_id: i64, id: i64) -> Result<Option<SalesMetricsRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{} WHERE user_id = ? AND id = ?", SELECT_COLUMNS),
                params![user_id, id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// The user's most recent metrics row
    pub fn latest_sales_metrics(&self, user_id: i64) -> Result<Option<SalesMetricsRecord>> {
        Ok(self.list_sales_metrics(user_id, Some(1), 0)?.into_iter().next())
    }
}
