//! Analysis orchestration
//!
//! Grid in, `SalesAnalysis` out: preview, signature, detection, header
//! resolution, column matching, cleaning, aggregation and finally the cache
//! write for the confirmed mapping.

use tracing::{debug, info, warn};

use crate::ai::AIClient;
use crate::cache::MappingCache;
use crate::clean::{clean, RecordSet};
use crate::columns::{column_index, match_column, normalize_headers};
use crate::config::AnalysisConfig;
use crate::detect::{DetectOptions, Detection, HeaderDetector};
use crate::error::{Error, Result};
use crate::metrics::aggregate;
use crate::models::{ColumnMapping, Diagnostics, Grid, SalesAnalysis};
use crate::signature::signature_for;

/// Runs the full analysis for one upload
pub struct SalesAnalyzer<'a> {
    cache: Option<&'a dyn MappingCache>,
    ai: Option<&'a AIClient>,
    config: AnalysisConfig,
    options: DetectOptions,
    write_cache: bool,
}

impl<'a> SalesAnalyzer<'a> {
    pub fn new(cache: &'a dyn MappingCache, ai: Option<&'a AIClient>) -> Self {
        Self {
            cache: Some(cache),
            ai,
            config: AnalysisConfig::default(),
            options: DetectOptions::default(),
            write_cache: true,
        }
    }

    /// Analyzer with no cache and no model (nothing is persisted)
    pub fn heuristic_only() -> Self {
        Self {
            cache: None,
            ai: None,
            config: AnalysisConfig::default(),
            options: DetectOptions::heuristic_only(),
            write_cache: false,
        }
    }

    /// Analyzer that trusts only the model
    pub fn model_only(ai: &'a AIClient) -> Self {
        Self {
            cache: None,
            ai: Some(ai),
            config: AnalysisConfig::default(),
            options: DetectOptions {
                use_cache: false,
                use_model: true,
            },
            write_cache: false,
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: DetectOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip the cache write after a successful analysis
    pub fn without_cache_write(mut self) -> Self {
        self.write_cache = false;
        self
    }

    fn detector(&self) -> HeaderDetector<'a> {
        HeaderDetector::from_sources(self.cache, self.ai)
            .with_config(self.config.clone())
            .with_options(self.options)
    }

    /// Analyze a grid on behalf of a user
    pub async fn analyze(&self, user_id: i64, grid: &Grid) -> Result<SalesAnalysis> {
        let preview = grid.preview(self.config.preview_rows);
        let signature = signature_for(&preview);
        debug!(rows = grid.len(), signature = %signature, "Analyzing upload");

        let Detection {
            mapping: detected,
            strategy,
            used_external_assist,
            diagnostic_message,
            attempts,
        } = self.detector().detect(user_id, &signature, &preview).await?;

        let header_row = grid
            .row(detected.header_row_index)
            .ok_or_else(|| Error::HeaderNotDetected {
                attempted_row: detected.header_row_index,
                attempts: attempts.clone(),
            })?;
        // Blank cells still get placeholder names; only a cell-less row is empty
        if header_row.is_empty() {
            return Err(Error::EmptyHeaderRow(detected.header_row_index));
        }
        let headers = normalize_headers(header_row);

        let sales_match = match_column(&headers, &detected.sales_column).map(str::to_string);
        let bill_match = match_column(&headers, &detected.bill_column).map(str::to_string);
        let (Some(sales_column), Some(bill_column)) = (sales_match, bill_match) else {
            warn!(
                sales = %detected.sales_column,
                bill = %detected.bill_column,
                "Detected columns do not match any header"
            );
            return Err(Error::ColumnMismatch {
                headers,
                sales_detected: detected.sales_column,
                bill_detected: detected.bill_column,
            });
        };
        let mapping = ColumnMapping::new(detected.header_row_index, sales_column, bill_column);

        // Both names come from `headers`, so the positions exist. A repeated
        // name resolves to its last column.
        let sales_idx = column_index(&headers, &mapping.sales_column).unwrap_or_default();
        let bill_idx = column_index(&headers, &mapping.bill_column).unwrap_or_default();

        let records = RecordSet::build(grid, mapping.header_row_index, headers.clone());
        let report = clean(&records, sales_idx, bill_idx, &self.config);
        let metrics = aggregate(&records, &report.kept, sales_idx, bill_idx);

        if self.write_cache {
            if let Some(cache) = self.cache {
                if let Err(e) = cache.upsert(user_id, &signature, &mapping) {
                    warn!("Failed to cache column mapping: {}", e);
                }
            }
        }

        info!(
            strategy = %strategy,
            total_sales = metrics.total_sales,
            bill_rows = metrics.bill_row_count,
            unique_bills = metrics.unique_bill_count,
            "Analysis complete"
        );

        let diagnostics = Diagnostics {
            header_row_index: mapping.header_row_index,
            sales_column: mapping.sales_column.clone(),
            bill_column: mapping.bill_column.clone(),
            used_external_assist,
            diagnostic_message,
            dropped_blank_rows: report.blank.len(),
            dropped_totalish_rows: report.totalish.len(),
            dropped_summary_rows: report.summary.len(),
            dropped_missing_bill_rows: report.missing_bill.len(),
            final_rows_used: report.kept.len(),
            strategy,
            attempts,
            signature,
            removed_rows: report.removed_rows(),
        };

        Ok(SalesAnalysis {
            summary: metrics.summary(),
            metrics,
            diagnostics,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::cache::InMemoryMappingCache;
    use crate::models::Strategy;

    fn example_grid() -> Grid {
        Grid::from(vec![
            vec!["Date", "Bill No", "Amount"],
            vec!["01/01", "B1", "100"],
            vec!["", "Total", "100"],
            vec!["01/02", "B2", "200"],
            vec!["", "", ""],
        ])
    }

    #[tokio::test]
    async fn test_basic_example() {
        let cache = InMemoryMappingCache::new();
        let analysis = SalesAnalyzer::new(&cache, None)
            .analyze(1, &example_grid())
            .await
            .unwrap();

        assert_eq!(analysis.metrics.total_sales, 300.0);
        assert_eq!(analysis.metrics.bill_row_count, 2);
        assert_eq!(analysis.metrics.unique_bill_count, 2);
        assert_eq!(
            analysis.summary,
            "Total sales = 300.00, bill rows = 2, unique bill IDs = 2."
        );

        let d = &analysis.diagnostics;
        assert_eq!(d.header_row_index, 0);
        assert_eq!(d.sales_column, "Amount");
        assert_eq!(d.bill_column, "Bill No");
        assert_eq!(d.strategy, Strategy::Heuristic);
        assert!(!d.used_external_assist);
        assert_eq!(d.dropped_blank_rows, 1);
        assert_eq!(d.dropped_totalish_rows, 1);
        assert_eq!(d.dropped_summary_rows, 0);
        assert_eq!(d.final_rows_used, 2);
        assert_eq!(d.removed_rows.blank, vec![4]);
        assert_eq!(d.removed_rows.totalish, vec![2]);
        assert_eq!(analysis.headers, vec!["Date", "Bill No", "Amount"]);
    }

    #[tokio::test]
    async fn test_second_run_hits_cache() {
        let cache = InMemoryMappingCache::new();
        let analyzer = SalesAnalyzer::new(&cache, None);

        let first = analyzer.analyze(7, &example_grid()).await.unwrap();
        assert_eq!(first.diagnostics.strategy, Strategy::Heuristic);
        assert_eq!(cache.len(), 1);

        let second = analyzer.analyze(7, &example_grid()).await.unwrap();
        assert_eq!(second.diagnostics.strategy, Strategy::Cache);
        assert_eq!(second.diagnostics.diagnostic_message, "cache");
        assert_eq!(second.metrics, first.metrics);

        // Another user does not see user 7's mapping
        let other = analyzer.analyze(8, &example_grid()).await.unwrap();
        assert_eq!(other.diagnostics.strategy, Strategy::Heuristic);
    }

    #[tokio::test]
    async fn test_without_cache_write() {
        let cache = InMemoryMappingCache::new();
        SalesAnalyzer::new(&cache, None)
            .without_cache_write()
            .analyze(1, &example_grid())
            .await
            .unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_model_assisted_offset_header() {
        let grid = Grid::from(vec![
            vec!["Sales Register", "", ""],
            vec!["From 01-Jan to 31-Jan", "", ""],
            vec!["Date", "Bill No", "Item Net Amt"],
            vec!["01/01", "B1", "1,200.50"],
            vec!["01/01", "B1", "99.50"],
            vec!["", "NA", "500"],
            vec!["", "Grand Total", "1800"],
        ]);
        let cache = InMemoryMappingCache::new();
        let ai = AIClient::mock();

        let analysis = SalesAnalyzer::new(&cache, Some(&ai))
            .analyze(1, &grid)
            .await
            .unwrap();
        let d = &analysis.diagnostics;
        assert_eq!(d.strategy, Strategy::Model);
        assert!(d.used_external_assist);
        assert_eq!(d.header_row_index, 2);
        assert_eq!(d.sales_column, "Item Net Amt");
        assert_eq!(d.dropped_totalish_rows, 1);
        // "NA" bill and nothing else besides the amount is a sparse summary line
        assert_eq!(d.dropped_summary_rows, 1);
        assert_eq!(analysis.metrics.total_sales, 1300.0);
        assert_eq!(analysis.metrics.bill_row_count, 2);
        assert_eq!(analysis.metrics.unique_bill_count, 1);
    }

    #[tokio::test]
    async fn test_approximate_model_names_are_matched() {
        let grid = Grid::from(vec![
            vec!["Date", "Bill Number", "Net Amount (INR)"],
            vec!["01/01", "B1", "10"],
        ]);
        let cache = InMemoryMappingCache::new();
        let ai = AIClient::Mock(MockBackend::with_response(
            r#"{"header_row_index": 0, "sales_column": "net amount", "bill_column": "BILL NUMBER"}"#,
        ));

        let analysis = SalesAnalyzer::new(&cache, Some(&ai))
            .analyze(1, &grid)
            .await
            .unwrap();
        assert_eq!(analysis.diagnostics.sales_column, "Net Amount (INR)");
        assert_eq!(analysis.diagnostics.bill_column, "Bill Number");

        // The exact header names are what gets cached
        let sig = analysis.diagnostics.signature.clone();
        let cached = cache.get(1, &sig).unwrap().unwrap();
        assert_eq!(cached.sales_column, "Net Amount (INR)");
    }

    #[tokio::test]
    async fn test_column_mismatch_carries_headers() {
        let grid = Grid::from(vec![
            vec!["Date", "Customer", "Qty"],
            vec!["01/01", "Ann", "3"],
        ]);
        let cache = InMemoryMappingCache::new();
        let err = SalesAnalyzer::new(&cache, None)
            .analyze(1, &grid)
            .await
            .unwrap_err();
        match err {
            Error::ColumnMismatch {
                headers,
                sales_detected,
                bill_detected,
            } => {
                assert_eq!(headers, vec!["Date", "Customer", "Qty"]);
                assert_eq!(sales_detected, "");
                assert_eq!(bill_detected, "");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_grid() {
        let cache = InMemoryMappingCache::new();
        let err = SalesAnalyzer::new(&cache, None)
            .analyze(1, &Grid::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HeaderNotDetected { .. }));
    }

    #[tokio::test]
    async fn test_blank_header_cells_become_placeholders() {
        let grid = Grid::from(vec![vec!["", "", ""], vec!["1", "2", "3"]]);
        let err = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap_err();
        match err {
            Error::ColumnMismatch { headers, .. } => {
                assert_eq!(headers, vec!["Col0", "Col1", "Col2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_header_row_without_cells() {
        let grid = Grid::new(vec![vec![], vec!["1".to_string(), "2".to_string()]]);
        let err = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyHeaderRow(0)));
    }

    #[tokio::test]
    async fn test_repeated_header_uses_last_column() {
        let grid = Grid::from(vec![
            vec!["Amount", "Bill", "Amount"],
            vec!["1", "B1", "100"],
            vec!["2", "B2", "250.5"],
        ]);
        let analysis = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap();
        assert_eq!(analysis.diagnostics.sales_column, "Amount");
        assert_eq!(analysis.metrics.total_sales, 350.5);
        assert_eq!(analysis.metrics.bill_row_count, 2);
        assert_eq!(analysis.metrics.unique_bill_count, 2);
    }

    #[tokio::test]
    async fn test_documented_example_grid() {
        let grid = Grid::from(vec![
            vec!["Date", "Bill No", "Amount"],
            vec!["1/1", "B1", "100"],
            vec!["1/2", "Total", "50"],
            vec!["1/3", "B2", "200"],
        ]);
        let analysis = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap();
        assert_eq!(analysis.metrics.total_sales, 300.0);
        assert_eq!(analysis.metrics.bill_row_count, 2);
        assert_eq!(analysis.metrics.unique_bill_count, 2);
        assert_eq!(analysis.diagnostics.removed_rows.totalish, vec![2]);
    }

    #[tokio::test]
    async fn test_placeholder_headers() {
        let grid = Grid::from(vec![
            vec!["", "Bill", "Amount"],
            vec!["x", "B1", "5"],
        ]);
        let analysis = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap();
        assert_eq!(analysis.headers, vec!["Col0", "Bill", "Amount"]);
        assert_eq!(analysis.metrics.total_sales, 5.0);
    }

    #[tokio::test]
    async fn test_no_usable_rows() {
        let grid = Grid::from(vec![
            vec!["Bill", "Amount"],
            vec!["-", "5"],
            vec!["", ""],
        ]);
        let analysis = SalesAnalyzer::heuristic_only()
            .analyze(1, &grid)
            .await
            .unwrap();
        assert_eq!(analysis.metrics.bill_row_count, 0);
        assert_eq!(analysis.metrics.total_sales, 0.0);
        assert_eq!(analysis.diagnostics.final_rows_used, 0);
    }
}
