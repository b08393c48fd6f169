//! Column mapping cache operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::cache::MappingCache;
use crate::error::Result;
use crate::models::{ColumnMapping, Signature, StoredMapping};

fn row_to_stored(row: &Row) -> rusqlite::Result<StoredMapping> {
    let header_row: i64 = row.get(2)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(StoredMapping {
        user_id: row.get(0)?,
        signature: Signature::new(row.get::<_, String>(1)?),
        mapping: ColumnMapping {
            header_row_index: usize::try_from(header_row).unwrap_or(0),
            sales_column: row.get(3)?,
            bill_column: row.get(4)?,
        },
        hit_count: row.get(5)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

impl Database {
    /// Look up a cached mapping, counting the hit
    pub fn get_column_mapping(
        &self,
        user_id: i64,
        signature: &Signature,
    ) -> Result<Option<ColumnMapping>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                r#"
                SELECT header_row, sales_column, bill_column FROM column_mappings
                WHERE user_id = ? AND signature = ?
                "#,
                params![user_id, signature.as_str()],
                |row| {
                    let header_row: i64 = row.get(0)?;
                    Ok((header_row, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                },
            )
            .optional()?;

        let Some((header_row, sales_column, bill_column)) = result else {
            return Ok(None);
        };

        conn.execute(
            r#"
            UPDATE column_mappings
            SET hit_count = hit_count + 1
            WHERE user_id = ? AND signature = ?
            "#,
            params![user_id, signature.as_str()],
        )?;

        // A negative row can only come from a hand-edited database
        let Ok(header_row_index) = usize::try_from(header_row) else {
            debug!(header_row, "Ignoring cached mapping with negative header row");
            return Ok(None);
        };

        Ok(Some(ColumnMapping {
            header_row_index,
            sales_column,
            bill_column,
        }))
    }

    /// Insert or overwrite a mapping (last writer wins)
    pub fn upsert_column_mapping(
        &self,
        user_id: i64,
        signature: &Signature,
        mapping: &ColumnMapping,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO column_mappings (user_id, signature, header_row, sales_column, bill_column)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, signature) DO UPDATE SET
                header_row = excluded.header_row,
                sales_column = excluded.sales_column,
                bill_column = excluded.bill_column,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                user_id,
                signature.as_str(),
                mapping.header_row_index as i64,
                mapping.sales_column,
                mapping.bill_column
            ],
        )?;
        Ok(())
    }

    /// All cached mappings for a user, most recently updated first
    pub fn list_column_mappings(&self, user_id: i64) -> Result<Vec<StoredMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, signature, header_row, sales_column, bill_column,
                   hit_count, created_at, updated_at
            FROM column_mappings
            WHERE user_id = ?
            ORDER BY updated_at DESC, id DESC
            "#,
        )?;
        let mappings = stmt
            .query_map(params![user_id], row_to_stored)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(mappings)
    }

    /// Forget one cached mapping; returns whether it existed
    pub fn delete_column_mapping(&self, user_id: i64, signature: &Signature) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM column_mappings WHERE user_id = ? AND signature = ?",
            params![user_id, signature.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Forget every cached mapping for a user; returns how many were removed
    pub fn clear_column_mappings(&self, user_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM column_mappings WHERE user_id = ?",
            params![user_id],
        )?;
        Ok(deleted)
    }
}

impl MappingCache for Database {
    fn get(&self, user_id: i64, signature: &Signature) -> Result<Option<ColumnMapping>> {
        self.get_column_mapping(user_id, signature)
    }

    fn upsert(&self, user_id: i64, signature: &Signature, mapping: &ColumnMapping) -> Result<()> {
        self.upsert_column_mapping(user_id, signature, mapping)
    }
}
