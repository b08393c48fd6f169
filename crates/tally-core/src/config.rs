//! Analysis configuration
//!
//! Loaded with a two-layer resolution:
//! 1. Explicit path, or the override at ~/.local/share/tally/config/analysis.toml
//! 2. Fall back to the embedded default (compiled into binary)
//!
//! Keys missing from an override keep their built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config
const DEFAULT_CONFIG: &str = include_str!("../../../config/analysis.toml");

/// Tunables for detection and cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Rows in the preview (detection window and signature input)
    pub preview_rows: usize,
    /// Minimum alphabetic share for a heuristic header candidate
    pub min_alpha_ratio: f64,
    /// Sales column keywords, highest priority first
    pub sales_keywords: Vec<String>,
    /// Bill column keywords, highest priority first
    pub bill_keywords: Vec<String>,
    /// Other-field allowance for the sparse summary trigger
    pub sparse_summary_max_other_fields: usize,
    /// Bill values treated as absent
    pub empty_bill_tokens: Vec<String>,
    /// Timeout for a model round-trip
    pub ai_timeout: Duration,
    /// Where this config came from (None = embedded default)
    pub source: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            min_alpha_ratio: 0.5,
            sales_keywords: to_strings(&[
                "sales",
                "amount",
                "amt",
                "net amt",
                "net amount",
                "total",
                "grand total",
                "invoice amount",
                "subtotal",
                "item net amt",
            ]),
            bill_keywords: to_strings(&[
                "bill",
                "bill no",
                "bill number",
                "invoice",
                "invoice no",
                "invoice number",
                "inv",
                "ref no",
                "reference",
                "voucher",
                "receipt",
            ]),
            sparse_summary_max_other_fields: 1,
            empty_bill_tokens: to_strings(&[
                "", "-", "na", "n/a", "none", "null", "nil", "nan", "0",
            ]),
            ai_timeout: Duration::from_secs(30),
            source: None,
        }
    }
}

impl AnalysisConfig {
    /// Load from the explicit path if given, else the default override location,
    /// else the embedded default
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(p) if p.exists() => Self::from_file(&p),
            _ => Self::embedded(),
        }
    }

    /// The embedded default configuration
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config = parse_config(&content)?;
        config.source = Some(path.to_path_buf());
        debug!(path = %path.display(), "Loaded analysis config");
        Ok(config)
    }

    /// Whether a trimmed bill value counts as absent
    pub fn is_empty_bill(&self, value: &str) -> bool {
        let v = value.trim().to_lowercase();
        self.empty_bill_tokens.iter().any(|t| *t == v)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("analysis.toml"))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Raw config structure for TOML parsing
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    detection: Option<RawDetection>,
    cleaning: Option<RawCleaning>,
    ai: Option<RawAi>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    preview_rows: Option<usize>,
    min_alpha_ratio: Option<f64>,
    sales_keywords: Option<Vec<String>>,
    bill_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawCleaning {
    sparse_summary_max_other_fields: Option<usize>,
    empty_bill_tokens: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawAi {
    timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<AnalysisConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AnalysisConfig::default();

    if let Some(detection) = raw.detection {
        if let Some(rows) = detection.preview_rows {
            if rows == 0 {
                return Err(Error::Config("preview_rows must be at least 1".into()));
            }
            config.preview_rows = rows;
        }
        if let Some(ratio) = detection.min_alpha_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::Config(format!(
                    "min_alpha_ratio must be between 0 and 1, got {}",
                    ratio
                )));
            }
            config.min_alpha_ratio = ratio;
        }
        if let Some(keywords) = detection.sales_keywords {
            config.sales_keywords = normalize_keywords(keywords);
        }
        if let Some(keywords) = detection.bill_keywords {
            config.bill_keywords = normalize_keywords(keywords);
        }
    }

    if let Some(cleaning) = raw.cleaning {
        if let Some(max) = cleaning.sparse_summary_max_other_fields {
            config.sparse_summary_max_other_fields = max;
        }
        if let Some(tokens) = cleaning.empty_bill_tokens {
            config.empty_bill_tokens = tokens
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .collect();
        }
    }

    if let Some(ai) = raw.ai {
        if let Some(secs) = ai.timeout_secs {
            config.ai_timeout = Duration::from_secs(secs.max(1));
        }
    }

    Ok(config)
}

fn normalize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
