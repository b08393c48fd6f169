//! Header/column detection
//!
//! Three strategies are tried in order, first success wins:
//!
//! 1. **Cache**: a mapping previously confirmed for this user and preview signature
//! 2. **Model**: an AI backend proposes the header row and both column names
//! 3. **Heuristic**: the row with the highest share of alphabetic cells is the
//!    header; columns are picked from priority keyword lists
//!
//! Each strategy returns a `StrategyOutcome` instead of an error, so a failed
//! cache read or model call just moves on to the next strategy. Every attempt
//! is recorded for diagnostics.

use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::cache::MappingCache;
use crate::columns::{normalize_headers, pick_column};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::models::{ColumnMapping, Preview, Signature, Strategy, StrategyAttempt, StrategyOutcome};

/// Which strategies a detector may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    pub use_cache: bool,
    pub use_model: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_model: true,
        }
    }
}

impl DetectOptions {
    /// Heuristic only
    pub fn heuristic_only() -> Self {
        Self {
            use_cache: false,
            use_model: false,
        }
    }
}

/// A resolved detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub mapping: ColumnMapping,
    pub strategy: Strategy,
    pub used_external_assist: bool,
    pub diagnostic_message: String,
    pub attempts: Vec<StrategyAttempt>,
}

/// Header/column detector
///
/// The mapping cache and the AI client are borrowed from the caller, which
/// owns their lifecycle.
pub struct HeaderDetector<'a> {
    cache: Option<&'a dyn MappingCache>,
    ai: Option<&'a AIClient>,
    config: AnalysisConfig,
    options: DetectOptions,
}

impl<'a> HeaderDetector<'a> {
    /// Detector over whichever sources are available
    ///
    /// A missing cache or model makes that strategy report itself skipped.
    pub fn from_sources(cache: Option<&'a dyn MappingCache>, ai: Option<&'a AIClient>) -> Self {
        Self {
            cache,
            ai,
            config: AnalysisConfig::default(),
            options: DetectOptions::default(),
        }
    }

    /// Detector backed by a mapping cache (no model)
    pub fn new(cache: &'a dyn MappingCache) -> Self {
        Self::from_sources(Some(cache), None)
    }

    /// Detector with both a mapping cache and an AI backend
    pub fn with_ai(cache: &'a dyn MappingCache, ai: Option<&'a AIClient>) -> Self {
        Self::from_sources(Some(cache), ai)
    }

    /// Detector with no cache and no model
    pub fn heuristic() -> Self {
        Self::from_sources(None, None).with_options(DetectOptions::heuristic_only())
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: DetectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Resolve the header row and target columns for a preview
    ///
    /// Fails with `HeaderNotDetected` only when every strategy failed.
    pub async fn detect(
        &self,
        user_id: i64,
        signature: &Signature,
        preview: &Preview,
    ) -> Result<Detection> {
        let mut attempts = Vec::with_capacity(Strategy::all().len());

        for &strategy in Strategy::all() {
            let outcome = match strategy {
                Strategy::Cache => self.try_cache(user_id, signature, preview),
                Strategy::Model => self.try_model(preview).await,
                Strategy::Heuristic => heuristic_detect(preview, &self.config),
            };

            match outcome {
                StrategyOutcome::Resolved(mapping) => {
                    info!(
                        strategy = %strategy,
                        header_row = mapping.header_row_index,
                        sales = %mapping.sales_column,
                        bill = %mapping.bill_column,
                        "Detected header and columns"
                    );
                    let diagnostic_message = describe(strategy, self.ai, &attempts);
                    attempts.push(StrategyAttempt {
                        strategy,
                        succeeded: true,
                        message: diagnostic_message.clone(),
                    });
                    return Ok(Detection {
                        mapping,
                        strategy,
                        used_external_assist: strategy == Strategy::Model,
                        diagnostic_message,
                        attempts,
                    });
                }
                StrategyOutcome::Failed(message) => {
                    debug!(strategy = %strategy, %message, "Detection strategy failed");
                    attempts.push(StrategyAttempt {
                        strategy,
                        succeeded: false,
                        message,
                    });
                }
                StrategyOutcome::Skipped(message) => {
                    debug!(strategy = %strategy, %message, "Detection strategy skipped");
                    attempts.push(StrategyAttempt {
                        strategy,
                        succeeded: false,
                        message,
                    });
                }
            }
        }

        Err(Error::HeaderNotDetected {
            attempted_row: 0,
            attempts,
        })
    }

    fn try_cache(&self, user_id: i64, signature: &Signature, preview: &Preview) -> StrategyOutcome {
        if !self.options.use_cache {
            return StrategyOutcome::Skipped("cache disabled".into());
        }
        let Some(cache) = self.cache else {
            return StrategyOutcome::Skipped("no mapping cache".into());
        };

        match cache.get(user_id, signature) {
            Ok(Some(mapping)) => match validate(&mapping, preview) {
                Ok(()) => StrategyOutcome::Resolved(mapping),
                Err(reason) => StrategyOutcome::Failed(format!("cached mapping unusable: {}", reason)),
            },
            Ok(None) => StrategyOutcome::Failed("cache miss".into()),
            Err(e) => {
                warn!("Mapping cache lookup failed: {}", e);
                StrategyOutcome::Failed(format!("cache error: {}", e))
            }
        }
    }

    async fn try_model(&self, preview: &Preview) -> StrategyOutcome {
        if !self.options.use_model {
            return StrategyOutcome::Skipped("model disabled".into());
        }
        let Some(ai) = self.ai else {
            return StrategyOutcome::Skipped("AI backend not configured".into());
        };

        let detection = match ai.detect_columns(preview).await {
            Ok(d) => d,
            Err(e) => {
                warn!(model = %ai.model(), "Model detection failed: {}", e);
                return StrategyOutcome::Failed(format!("model error: {}", e));
            }
        };

        let Ok(header_row_index) = usize::try_from(detection.header_row_index) else {
            return StrategyOutcome::Failed(format!(
                "model returned invalid header row {}",
                detection.header_row_index
            ));
        };
        let mapping = ColumnMapping {
            header_row_index,
            sales_column: detection.sales_column,
            bill_column: detection.bill_column,
        };
        match validate(&mapping, preview) {
            Ok(()) => StrategyOutcome::Resolved(mapping),
            Err(reason) => StrategyOutcome::Failed(format!("model answer unusable: {}", reason)),
        }
    }
}

/// A mapping must name both columns and point inside the preview
fn validate(mapping: &ColumnMapping, preview: &Preview) -> std::result::Result<(), String> {
    if mapping.header_row_index >= preview.len() {
        return Err(format!(
            "header row {} outside the {}-row preview",
            mapping.header_row_index,
            preview.len()
        ));
    }
    if mapping.sales_column.trim().is_empty() || mapping.bill_column.trim().is_empty() {
        return Err("missing column name".into());
    }
    Ok(())
}

fn describe(strategy: Strategy, ai: Option<&AIClient>, earlier: &[StrategyAttempt]) -> String {
    match strategy {
        Strategy::Cache => "cache".to_string(),
        Strategy::Model => match ai {
            Some(ai) => format!("model ({})", ai.model()),
            None => "model".to_string(),
        },
        Strategy::Heuristic if earlier.is_empty() => "heuristic".to_string(),
        Strategy::Heuristic => {
            let notes: Vec<String> = earlier
                .iter()
                .map(|a| format!("{}: {}", a.strategy, a.message))
                .collect();
            format!("heuristic ({})", notes.join("; "))
        }
    }
}

/// Share of non-empty cells that contain a letter; None for an all-empty row
pub fn alpha_ratio(row: &[String]) -> Option<f64> {
    let mut non_empty = 0usize;
    let mut alpha = 0usize;
    for cell in row {
        let t = cell.trim();
        if t.is_empty() {
            continue;
        }
        non_empty += 1;
        if t.chars().any(char::is_alphabetic) {
            alpha += 1;
        }
    }
    (non_empty > 0).then(|| alpha as f64 / non_empty as f64)
}

/// Pick the header row by alphabetic share
///
/// A row qualifies at `min_alpha_ratio` or above and replaces the current
/// best only with a strictly greater ratio, so ties keep the earlier row.
/// Defaults to row 0 when nothing qualifies.
pub fn heuristic_header_row(preview: &Preview, config: &AnalysisConfig) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for (i, row) in preview.rows().iter().enumerate().take(config.preview_rows) {
        let Some(ratio) = alpha_ratio(row) else {
            continue;
        };
        if ratio >= config.min_alpha_ratio && best.map_or(true, |(_, b)| ratio > b) {
            best = Some((i, ratio));
        }
    }
    best.map(|(i, _)| i).unwrap_or(0)
}

/// Heuristic strategy: header row by alphabetic share, columns by keyword
///
/// Column names may come back empty when no header matches a keyword; the
/// column matcher then reports the mismatch with the full header list.
pub fn heuristic_detect(preview: &Preview, config: &AnalysisConfig) -> StrategyOutcome {
    if preview.is_empty() {
        return StrategyOutcome::Failed("no rows to inspect".into());
    }

    let header_row_index = heuristic_header_row(preview, config);
    let headers = preview
        .rows()
        .get(header_row_index)
        .map(|row| normalize_headers(row))
        .unwrap_or_default();

    let sales_column = pick_column(&headers, &config.sales_keywords)
        .unwrap_or_default()
        .to_string();
    let bill_column = pick_column(&headers, &config.bill_keywords)
        .unwrap_or_default()
        .to_string();

    StrategyOutcome::Resolved(ColumnMapping {
        header_row_index,
        sales_column,
        bill_column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::cache::InMemoryMappingCache;
    use crate::models::Grid;
    use crate::signature::signature_for;

    fn preview(rows: Vec<Vec<&str>>) -> Preview {
        Grid::from(rows).preview(5)
    }

    fn sales_preview() -> Preview {
        preview(vec![
            vec!["ACME Traders", "", ""],
            vec!["Period: Jan", "", ""],
            vec!["Date", "Bill No", "Item Net Amt"],
            vec!["01/01", "B1", "100"],
            vec!["01/02", "B2", "200"],
        ])
    }

    #[test]
    fn test_alpha_ratio() {
        let row = |cells: &[&str]| cells.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(alpha_ratio(&row(&["Date", "Bill", "100"])), Some(2.0 / 3.0));
        assert_eq!(alpha_ratio(&row(&["", "  "])), None);
        assert_eq!(alpha_ratio(&row(&["1", "2"])), Some(0.0));
        assert_eq!(alpha_ratio(&row(&["Größe", "", "5"])), Some(0.5));
    }

    #[test]
    fn test_heuristic_header_prefers_highest_ratio() {
        let config = AnalysisConfig::default();
        // Row 0 ratio 1.0 ("ACME Traders" only), row 2 ratio 1.0: tie keeps row 0
        assert_eq!(heuristic_header_row(&sales_preview(), &config), 0);

        let p = preview(vec![
            vec!["Report", "2024", "01"],
            vec!["Date", "Bill No", "Amount"],
            vec!["01/01", "B1", "100"],
        ]);
        assert_eq!(heuristic_header_row(&p, &config), 1);
    }

    #[test]
    fn test_heuristic_header_defaults_to_zero() {
        let config = AnalysisConfig::default();
        let p = preview(vec![vec!["1", "2"], vec![], vec!["3", "x", "4"]]);
        assert_eq!(heuristic_header_row(&p, &config), 0);
    }

    #[test]
    fn test_heuristic_skips_empty_rows() {
        let config = AnalysisConfig::default();
        let p = preview(vec![vec!["", ""], vec!["1", "2"], vec!["Bill", "Amount"]]);
        assert_eq!(heuristic_header_row(&p, &config), 2);
    }

    #[test]
    fn test_heuristic_detect_columns() {
        let config = AnalysisConfig::default();
        let p = preview(vec![
            vec!["Date", "Invoice No", "Qty", "Net Amount"],
            vec!["01/01", "I-1", "2", "100"],
        ]);
        let StrategyOutcome::Resolved(mapping) = heuristic_detect(&p, &config) else {
            panic!("heuristic should resolve");
        };
        assert_eq!(mapping.header_row_index, 0);
        // "net amount" is an exact keyword hit
        assert_eq!(mapping.sales_column, "Net Amount");
        assert_eq!(mapping.bill_column, "Invoice No");
    }

    #[test]
    fn test_heuristic_detect_empty_preview() {
        let config = AnalysisConfig::default();
        assert!(matches!(
            heuristic_detect(&Preview::default(), &config),
            StrategyOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_cache_hit_wins() {
        let cache = InMemoryMappingCache::new();
        let p = sales_preview();
        let sig = signature_for(&p);
        cache
            .upsert(1, &sig, &ColumnMapping::new(2, "Item Net Amt", "Bill No"))
            .unwrap();
        let ai = AIClient::Mock(MockBackend::failing("should not be called"));

        let detection = HeaderDetector::with_ai(&cache, Some(&ai))
            .detect(1, &sig, &p)
            .await
            .unwrap();
        assert_eq!(detection.strategy, Strategy::Cache);
        assert_eq!(detection.diagnostic_message, "cache");
        assert!(!detection.used_external_assist);
        assert_eq!(detection.mapping.header_row_index, 2);
        assert_eq!(detection.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_model_used_on_cache_miss() {
        let cache = InMemoryMappingCache::new();
        let p = sales_preview();
        let ai = AIClient::mock();

        let detection = HeaderDetector::with_ai(&cache, Some(&ai))
            .detect(1, &signature_for(&p), &p)
            .await
            .unwrap();
        assert_eq!(detection.strategy, Strategy::Model);
        assert!(detection.used_external_assist);
        assert_eq!(detection.mapping, ColumnMapping::new(2, "Item Net Amt", "Bill No"));
        assert_eq!(detection.diagnostic_message, "model (mock)");
    }

    #[tokio::test]
    async fn test_cascade_to_heuristic_on_model_failure() {
        let cache = InMemoryMappingCache::new();
        let p = preview(vec![
            vec!["Report", "2024", "01"],
            vec!["Date", "Bill No", "Amount"],
            vec!["01/01", "B1", "100"],
        ]);
        let ai = AIClient::Mock(MockBackend::failing("connection refused"));

        let detection = HeaderDetector::with_ai(&cache, Some(&ai))
            .detect(1, &signature_for(&p), &p)
            .await
            .unwrap();
        assert_eq!(detection.strategy, Strategy::Heuristic);
        assert!(!detection.used_external_assist);
        assert_eq!(detection.mapping, ColumnMapping::new(1, "Amount", "Bill No"));
        assert!(detection.diagnostic_message.starts_with("heuristic ("));
        assert!(detection.diagnostic_message.contains("cache miss"));
        assert!(detection.diagnostic_message.contains("connection refused"));
        assert_eq!(detection.attempts.len(), 3);
        assert!(!detection.attempts[1].succeeded);
    }

    #[tokio::test]
    async fn test_unparsable_model_answer_cascades() {
        let cache = InMemoryMappingCache::new();
        let p = sales_preview();
        for raw in [
            "",
            "Sorry, I can't help",
            "```json\n{\"header_row_index\": 9, \"sales_column\": \"A\", \"bill_column\": \"B\"}\n```",
            "{\"header_row_index\": -1, \"sales_column\": \"A\", \"bill_column\": \"B\"}",
            "{\"header_row_index\": 2, \"sales_column\": \"\", \"bill_column\": \"Bill No\"}",
        ] {
            let ai = AIClient::Mock(MockBackend::with_response(raw));
            let detection = HeaderDetector::with_ai(&cache, Some(&ai))
                .detect(1, &signature_for(&p), &p)
                .await
                .unwrap();
            assert_eq!(detection.strategy, Strategy::Heuristic, "raw: {:?}", raw);
        }
    }

    #[tokio::test]
    async fn test_options_skip_strategies() {
        let cache = InMemoryMappingCache::new();
        let p = sales_preview();
        let sig = signature_for(&p);
        cache
            .upsert(1, &sig, &ColumnMapping::new(2, "Item Net Amt", "Bill No"))
            .unwrap();
        let ai = AIClient::mock();

        let detection = HeaderDetector::with_ai(&cache, Some(&ai))
            .with_options(DetectOptions {
                use_cache: false,
                use_model: true,
            })
            .detect(1, &sig, &p)
            .await
            .unwrap();
        assert_eq!(detection.strategy, Strategy::Model);
        assert_eq!(detection.attempts[0].message, "cache disabled");

        let detection = HeaderDetector::with_ai(&cache, Some(&ai))
            .with_options(DetectOptions::heuristic_only())
            .detect(1, &sig, &p)
            .await
            .unwrap();
        assert_eq!(detection.strategy, Strategy::Heuristic);
    }

    #[tokio::test]
    async fn test_stale_cache_entry_cascades() {
        let cache = InMemoryMappingCache::new();
        let p = sales_preview();
        let sig = signature_for(&p);
        cache
            .upsert(1, &sig, &ColumnMapping::new(40, "Item Net Amt", "Bill No"))
            .unwrap();

        let detection = HeaderDetector::new(&cache).detect(1, &sig, &p).await.unwrap();
        assert_eq!(detection.strategy, Strategy::Heuristic);
        assert!(detection.attempts[0].message.starts_with("cached mapping unusable"));
    }

    #[tokio::test]
    async fn test_all_strategies_exhausted() {
        let err = HeaderDetector::heuristic()
            .detect(1, &signature_for(&Preview::default()), &Preview::default())
            .await
            .unwrap_err();
        match err {
            Error::HeaderNotDetected { attempted_row, attempts } => {
                assert_eq!(attempted_row, 0);
                assert_eq!(attempts.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
