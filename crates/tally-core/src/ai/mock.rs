//! Mock backend for testing
//!
//! Deterministic answers for both capabilities, with modes to replay a raw
//! model response (through the real parsers) or to fail every call.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Preview;

use super::parsing::{parse_column_detection, parse_sales_classification};
use super::types::{ColumnDetection, SalesClassification};
use super::AIBackend;

const SALES_HINTS: &[&str] = &["amount", "sales", "amt", "total"];
const BILL_HINTS: &[&str] = &["bill", "invoice", "inv", "receipt", "voucher"];

#[derive(Clone, Debug, Default)]
enum MockMode {
    /// Keyword-based answers
    #[default]
    Keywords,
    /// Return this raw text from the "model"
    Raw(String),
    /// Every call fails with this message
    Failing(String),
}

/// Mock AI backend for testing
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    mode: MockMode,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            mode: MockMode::Keywords,
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            mode: MockMode::Keywords,
        }
    }

    /// Answer every call with this raw model text
    pub fn with_response(raw: &str) -> Self {
        Self {
            healthy: true,
            mode: MockMode::Raw(raw.to_string()),
        }
    }

    /// Fail every call (as a transport error would)
    pub fn failing(message: &str) -> Self {
        Self {
            healthy: false,
            mode: MockMode::Failing(message.to_string()),
        }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }
}

fn contains_any(cell: &str, hints: &[&str]) -> bool {
    let lower = cell.to_lowercase();
    hints.iter().any(|h| lower.contains(h))
}

/// First preview row with both a sales-looking and a bill-looking cell
pub(crate) fn keyword_detection(preview: &Preview) -> Option<ColumnDetection> {
    preview.rows().iter().enumerate().find_map(|(i, row)| {
        let sales = row.iter().find(|c| contains_any(c, SALES_HINTS))?;
        let bill = row.iter().find(|c| contains_any(c, BILL_HINTS))?;
        Some(ColumnDetection {
            header_row_index: i as i64,
            sales_column: sales.trim().to_string(),
            bill_column: bill.trim().to_string(),
        })
    })
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn detect_columns(&self, preview: &Preview) -> Result<ColumnDetection> {
        match &self.mode {
            MockMode::Keywords => keyword_detection(preview).ok_or_else(|| {
                Error::InvalidData("Mock model found no header row".into())
            }),
            MockMode::Raw(raw) => parse_column_detection(raw),
            MockMode::Failing(message) => Err(Error::InvalidData(message.clone())),
        }
    }

    async fn classify_sales(&self, preview: &Preview) -> Result<SalesClassification> {
        match &self.mode {
            MockMode::Keywords => {
                let is_sales = keyword_detection(preview).is_some();
                Ok(SalesClassification {
                    is_sales,
                    confidence: if is_sales { 0.9 } else { 0.1 },
                })
            }
            MockMode::Raw(raw) => parse_sales_classification(raw),
            MockMode::Failing(message) => Err(Error::InvalidData(message.clone())),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grid;

    fn preview(rows: Vec<Vec<&str>>) -> Preview {
        Grid::from(rows).preview(5)
    }

    #[tokio::test]
    async fn test_keyword_detection() {
        let mock = MockBackend::new();
        let p = preview(vec![
            vec!["Shop Report"],
            vec!["Date", "Invoice No", "Net Amount"],
            vec!["1/1", "I-1", "10"],
        ]);

        let detection = mock.detect_columns(&p).await.unwrap();
        assert_eq!(detection.header_row_index, 1);
        assert_eq!(detection.sales_column, "Net Amount");
        assert_eq!(detection.bill_column, "Invoice No");

        let classification = mock.classify_sales(&p).await.unwrap();
        assert!(classification.is_sales);
    }

    #[tokio::test]
    async fn test_keyword_detection_miss() {
        let mock = MockBackend::new();
        let p = preview(vec![vec!["Name", "Qty"], vec!["Widget", "3"]]);

        assert!(mock.detect_columns(&p).await.is_err());
        assert!(!mock.classify_sales(&p).await.unwrap().is_sales);
    }

    #[tokio::test]
    async fn test_raw_response_uses_parser() {
        let mock = MockBackend::with_response(
            "```json\n{\"header_row_index\": 3, \"sales_column\": \"Amt\", \"bill_column\": \"Ref\"}\n```",
        );
        let detection = mock.detect_columns(&Preview::default()).await.unwrap();
        assert_eq!(detection.header_row_index, 3);

        let garbage = MockBackend::with_response("no idea");
        assert!(garbage.detect_columns(&Preview::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_and_health() {
        let mock = MockBackend::failing("connection refused");
        assert!(mock.detect_columns(&Preview::default()).await.is_err());
        assert!(mock.classify_sales(&Preview::default()).await.is_err());
        assert!(!mock.health_check().await);

        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
