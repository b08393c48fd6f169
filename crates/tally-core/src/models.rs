//! Data models for Tally

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Raw grid of text cells as read from an upload
///
/// Rows may have differing lengths. Immutable once read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows, used for cheap detection
    pub fn preview(&self, n: usize) -> Preview {
        Preview {
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

impl From<Vec<Vec<&str>>> for Grid {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// The first few rows of a grid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preview {
    rows: Vec<Vec<String>>,
}

impl Preview {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest preview row
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Compact row/column structure sent to the model
    ///
    /// `{"columns": ["col0", ...], "index": [0, ...], "data": [[...], ...]}` with
    /// every data row padded to the preview width.
    pub fn to_split_json(&self) -> Value {
        let width = self.width();
        let columns: Vec<String> = (0..width).map(|i| format!("col{}", i)).collect();
        let index: Vec<usize> = (0..self.rows.len()).collect();
        let data: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut padded = row.clone();
                padded.resize(width, String::new());
                padded
            })
            .collect();
        json!({ "columns": columns, "index": index, "data": data })
    }
}

/// Opaque cache key derived from a preview
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirmed header row and target columns for a layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub header_row_index: usize,
    pub sales_column: String,
    pub bill_column: String,
}

impl ColumnMapping {
    pub fn new(
        header_row_index: usize,
        sales_column: impl Into<String>,
        bill_column: impl Into<String>,
    ) -> Self {
        Self {
            header_row_index,
            sales_column: sales_column.into(),
            bill_column: bill_column.into(),
        }
    }
}

/// A cached mapping row as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMapping {
    pub user_id: i64,
    pub signature: Signature,
    pub mapping: ColumnMapping,
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Header/column detection strategies, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Cache,
    Model,
    Heuristic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Model => "model",
            Self::Heuristic => "heuristic",
        }
    }

    pub fn all() -> &'static [Strategy] {
        &[Self::Cache, Self::Model, Self::Heuristic]
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a single detection strategy
///
/// Strategies never raise; a failure carries its diagnostic text and the
/// orchestrator moves on to the next strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Resolved(ColumnMapping),
    Failed(String),
    Skipped(String),
}

/// Diagnostic record of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub succeeded: bool,
    pub message: String,
}

/// The pipeline's terminal output
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_sales: f64,
    pub bill_row_count: usize,
    pub unique_bill_count: usize,
}

impl Metrics {
    /// One-line plain-text summary
    pub fn summary(&self) -> String {
        format!(
            "Total sales = {:.2}, bill rows = {}, unique bill IDs = {}.",
            self.total_sales, self.bill_row_count, self.unique_bill_count
        )
    }
}

/// Diagnostic bundle consumed by the reporting layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub header_row_index: usize,
    pub sales_column: String,
    pub bill_column: String,
    pub used_external_assist: bool,
    pub diagnostic_message: String,
    pub dropped_blank_rows: usize,
    pub dropped_totalish_rows: usize,
    pub dropped_summary_rows: usize,
    pub dropped_missing_bill_rows: usize,
    pub final_rows_used: usize,
    pub strategy: Strategy,
    pub attempts: Vec<StrategyAttempt>,
    pub signature: Signature,
    /// Original grid row indices removed by each cleaning stage
    pub removed_rows: RemovedRows,
}

/// Grid row indices removed per cleaning stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedRows {
    pub blank: Vec<usize>,
    pub totalish: Vec<usize>,
    pub summary: Vec<usize>,
    pub missing_bill: Vec<usize>,
}

/// Everything produced by one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesAnalysis {
    pub metrics: Metrics,
    pub diagnostics: Diagnostics,
    pub headers: Vec<String>,
    pub summary: String,
}

/// Persisted metrics row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesMetricsRecord {
    pub id: i64,
    pub user_id: i64,
    pub source_type: String,
    pub file_name: Option<String>,
    pub payload: Option<Value>,
    pub total_sales: f64,
    pub bill_row_count: i64,
    pub unique_bill_count: i64,
    pub created_at: DateTime<Utc>,
}

/// New metrics row to persist
#[derive(Debug, Clone)]
pub struct NewSalesMetrics {
    pub user_id: i64,
    pub source_type: String,
    pub file_name: Option<String>,
    pub payload: Option<Value>,
    pub metrics: Metrics,
}
