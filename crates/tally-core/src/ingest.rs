//! Upload classification
//!
//! Decides whether an upload is sales data before it is stored. The cheap
//! heuristic pipeline runs first; only when it finds nothing usable is the
//! model asked, and a positive answer must still survive a model-only
//! analysis.

use serde::Serialize;
use tracing::{debug, info};

use crate::ai::{AIBackend, AIClient};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{Grid, SalesAnalysis, Strategy};
use crate::pipeline::SalesAnalyzer;

/// Outcome of classifying an upload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Sales {
        via: Strategy,
        analysis: Box<SalesAnalysis>,
    },
    NotSales {
        reason: String,
    },
}

impl Verdict {
    pub fn is_sales(&self) -> bool {
        matches!(self, Verdict::Sales { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Verdict::Sales { via: Strategy::Heuristic, .. } => {
                "detected as sales via heuristics".to_string()
            }
            Verdict::Sales { via, .. } => format!("detected as sales via {}", via),
            Verdict::NotSales { reason } => format!("not sales data: {}", reason),
        }
    }
}

pub struct UploadClassifier<'a> {
    ai: Option<&'a AIClient>,
    config: AnalysisConfig,
}

impl<'a> UploadClassifier<'a> {
    pub fn new(ai: Option<&'a AIClient>) -> Self {
        Self {
            ai,
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Classify a grid; nothing is written to any cache
    pub async fn classify(&self, grid: &Grid) -> Result<Verdict> {
        let heuristic = SalesAnalyzer::heuristic_only()
            .with_config(self.config.clone())
            .analyze(0, grid)
            .await;
        let heuristic_reason = match heuristic {
            Ok(analysis) if analysis.metrics.bill_row_count > 0 => {
                info!(rows = analysis.metrics.bill_row_count, "Upload detected as sales via heuristics");
                return Ok(Verdict::Sales {
                    via: Strategy::Heuristic,
                    analysis: Box::new(analysis),
                });
            }
            Ok(_) => "heuristics found no usable rows".to_string(),
            Err(e) => format!("heuristics failed: {}", e),
        };
        debug!(reason = %heuristic_reason, "Heuristic classification negative");

        let Some(ai) = self.ai else {
            return Ok(Verdict::NotSales {
                reason: format!("{}; AI backend not configured", heuristic_reason),
            });
        };

        let preview = grid.preview(self.config.preview_rows);
        let classification = match ai.classify_sales(&preview).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(Verdict::NotSales {
                    reason: format!("{}; model classification failed: {}", heuristic_reason, e),
                })
            }
        };
        if !classification.is_sales {
            return Ok(Verdict::NotSales {
                reason: format!(
                    "model says not sales (confidence {:.2})",
                    classification.confidence
                ),
            });
        }

        match SalesAnalyzer::model_only(ai)
            .with_config(self.config.clone())
            .analyze(0, grid)
            .await
        {
            Ok(analysis) if analysis.metrics.bill_row_count > 0 => {
                info!(model = %ai.model(), "Upload detected as sales via model");
                Ok(Verdict::Sales {
                    via: Strategy::Model,
                    analysis: Box::new(analysis),
                })
            }
            Ok(_) => Ok(Verdict::NotSales {
                reason: "model-assisted analysis found no usable rows".to_string(),
            }),
            Err(e) => Ok(Verdict::NotSales {
                reason: format!("model-assisted analysis failed: {}", e),
            }),
        }
    }
}
