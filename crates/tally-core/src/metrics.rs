//! Metrics aggregation, plus figures reported as free text

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use crate::clean::RecordSet;
use crate::models::{Metrics, NewSalesMetrics};

/// History `source_type` for figures that did not come from an upload
pub const TEXT_SOURCE: &str = "text";

/// Parse a sales cell as a number
///
/// Keeps only ASCII digits, '.' and '-', then parses what is left. Currency
/// symbols, thousands separators and whitespace disappear; an empty or
/// unparsable remainder is not a number.
pub fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregate the rows of a cleaned view
pub fn aggregate(
    set: &RecordSet,
    view: &[usize],
    sales_column: usize,
    bill_column: usize,
) -> Metrics {
    let mut total = 0.0;
    let mut rows = 0;
    let mut bills = HashSet::new();

    for record in set.select(view) {
        rows += 1;
        if let Some(amount) = parse_amount(record.get(sales_column)) {
            total += amount;
        }
        let bill = record.get(bill_column).trim();
        if !bill.is_empty() {
            bills.insert(bill);
        }
    }

    Metrics {
        total_sales: round2(total),
        bill_row_count: rows,
        unique_bill_count: bills.len(),
    }
}

/// Figures reported by hand instead of computed from an upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportedMetrics {
    pub total_sales: Option<f64>,
    pub bill_row_count: Option<usize>,
    pub unique_bill_count: Option<usize>,
    /// Free text to mine when the explicit figures are incomplete
    pub text: String,
}

impl ReportedMetrics {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn explicit(total_sales: f64, bill_row_count: usize, unique_bill_count: usize) -> Self {
        Self {
            total_sales: Some(total_sales),
            bill_row_count: Some(bill_row_count),
            unique_bill_count: Some(unique_bill_count),
            text: String::new(),
        }
    }

    /// Whether all three figures were given explicitly
    pub fn is_explicit(&self) -> bool {
        self.total_sales.is_some()
            && self.bill_row_count.is_some()
            && self.unique_bill_count.is_some()
    }

    /// Explicit figures when all three are present, else whatever the text yields
    pub fn resolve(&self) -> Metrics {
        match (self.total_sales, self.bill_row_count, self.unique_bill_count) {
            (Some(total_sales), Some(bill_row_count), Some(unique_bill_count)) => Metrics {
                total_sales: round2(total_sales),
                bill_row_count,
                unique_bill_count,
            },
            _ => metrics_from_text(&self.text),
        }
    }

    /// History row for these figures
    pub fn to_new_record(&self, user_id: i64) -> NewSalesMetrics {
        NewSalesMetrics {
            user_id,
            source_type: TEXT_SOURCE.to_string(),
            file_name: None,
            payload: Some(json!({ "source": TEXT_SOURCE, "raw_text": self.text })),
            metrics: self.resolve(),
        }
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid regex"))
}

/// Pull figures out of a sentence such as "sales 12,400.50 over 38 bills, 31 unique"
///
/// The first number is the total. Whole numbers after it are the bill row
/// count and then the unique bill count. Commas inside numbers are thousands
/// separators. Anything missing is zero.
pub fn metrics_from_text(text: &str) -> Metrics {
    let mut numbers = number_pattern()
        .find_iter(text)
        .map(|m| m.as_str().replace(',', ""));

    let total_sales = numbers
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .unwrap_or(0.0);
    let mut counts = numbers
        .filter(|n| !n.contains('.'))
        .filter_map(|n| n.parse::<usize>().ok());

    Metrics {
        total_sales: round2(total_sales),
        bill_row_count: counts.next().unwrap_or(0),
        unique_bill_count: counts.next().unwrap_or(0),
    }
}
