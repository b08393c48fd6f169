//! Types returned by AI backends

use serde::{Deserialize, Serialize};

/// Header row and target columns proposed by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDetection {
    /// Signed so that an out-of-range answer (e.g. -1) parses and can be rejected
    pub header_row_index: i64,
    #[serde(default)]
    pub sales_column: String,
    #[serde(default)]
    pub bill_column: String,
}

/// Whether a preview looks like a sales export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesClassification {
    pub is_sales: bool,
    #[serde(default)]
    pub confidence: f64,
}
