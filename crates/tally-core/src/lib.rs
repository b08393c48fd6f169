//! Tally Core Library
//!
//! Turns arbitrary sales exports (CSV or spreadsheet) into three headline figures:
//! total sales, billable row count and distinct bill count.
//!
//! - Tabular reader for delimited text and spreadsheet binaries
//! - Preview signatures used as mapping cache keys
//! - Header/column detection (cache, model-assisted, heuristic)
//! - Column matching and the row-cleaning pipeline
//! - Metrics aggregation and persisted history
//! - Pluggable local AI backends (Ollama, OpenAI-compatible, mock)
//! - Prompt library for customizable AI prompts

pub mod ai;
pub mod cache;
pub mod clean;
pub mod columns;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod reader;
pub mod signature;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, ColumnDetection, MockBackend, OllamaBackend, OpenAICompatibleBackend,
    SalesClassification,
};
pub use cache::{InMemoryMappingCache, MappingCache};
pub use clean::{CleaningReport, RecordSet};
pub use config::AnalysisConfig;
pub use db::Database;
pub use detect::{DetectOptions, Detection, HeaderDetector};
pub use error::{Error, Result};
pub use ingest::{UploadClassifier, Verdict};
pub use metrics::ReportedMetrics;
pub use models::{
    ColumnMapping, Diagnostics, Grid, Metrics, Preview, SalesAnalysis, Signature, Strategy,
    StrategyAttempt, StrategyOutcome,
};
pub use pipeline::SalesAnalyzer;
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
