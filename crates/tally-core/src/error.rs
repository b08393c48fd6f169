//! Error types for Tally

use thiserror::Error;

use crate::models::StrategyAttempt;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Every detection strategy was exhausted without producing a header row
    #[error("could not detect header row (attempted row {attempted_row})")]
    HeaderNotDetected {
        attempted_row: usize,
        attempts: Vec<StrategyAttempt>,
    },

    #[error("header row {0} is empty")]
    EmptyHeaderRow(usize),

    /// Detected column names don't resolve against the real headers
    #[error(
        "could not match detected columns (sales: '{sales_detected}', bill: '{bill_detected}') \
         against headers [{}]",
        .headers.join(", ")
    )]
    ColumnMismatch {
        headers: Vec<String>,
        sales_detected: String,
        bill_detected: String,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
