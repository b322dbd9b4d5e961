//! Evaluator contract: model training/evaluation behind a fixed
//! interface.
//!
//! The pipeline treats evaluation as an opaque capability: any
//! implementation that returns a conforming [`EvalReport`] is
//! substitutable (gradient-boosted trees, random forest, the in-crate
//! [`LinearEvaluator`], a remote service).

mod linear;

pub use linear::LinearEvaluator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Prediction task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Continuous target.
    Regression,
    /// Categorical target.
    Classification,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regression => write!(f, "regression"),
            Self::Classification => write!(f, "classification"),
        }
    }
}

/// Regression metrics for one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean squared error.
    #[serde(rename = "MSE")]
    pub mse: f64,
    /// Root mean squared error.
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Coefficient of determination.
    #[serde(rename = "R2")]
    pub r2: f64,
    /// Observation count.
    #[serde(rename = "N Obs")]
    pub n_obs: usize,
}

/// Classification metrics for one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions.
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
    /// Mean negative log-likelihood.
    #[serde(rename = "LogLoss")]
    pub log_loss: f64,
    /// Observation count.
    #[serde(rename = "N Obs")]
    pub n_obs: usize,
}

/// Metrics for one split, task-dependent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    /// Regression metrics.
    Regression(RegressionMetrics),
    /// Classification metrics.
    Classification(ClassificationMetrics),
}

/// Train and test metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Metrics on the training split.
    pub train: Metrics,
    /// Metrics on the held-out split.
    pub test: Metrics,
}

/// One entry of the importance ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature column name.
    pub variable: String,
    /// Raw importance score, non-negative.
    pub relative_importance: f64,
    /// Importance scaled to the maximum (top feature = 1.0).
    pub scaled_importance: f64,
    /// Share of total importance; the column sums to ≈1, or is all
    /// zero when total importance is 0.
    pub percentage: f64,
}

/// Structured report from one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Unique id of the trained model.
    pub model_id: String,
    /// Model family and task, e.g. `linear_regression`.
    pub model_type: String,
    /// Train/test metrics.
    pub performance: Performance,
    /// Importance ranking, sorted descending by `relative_importance`.
    pub feature_importance: Vec<FeatureImportance>,
    /// One-sentence human-readable summary.
    pub narrative: String,
}

impl EvalReport {
    /// Name of the most important feature, if any.
    #[must_use]
    pub fn top_feature(&self) -> Option<&str> {
        self.feature_importance
            .first()
            .map(|f| f.variable.as_str())
    }
}

/// Builds a sorted, normalized importance ranking from raw scores.
///
/// Scores are sorted descending; `scaled_importance` is relative to the
/// maximum and `percentage` to the total. A zero total yields all-zero
/// scaled values and percentages.
#[must_use]
pub fn rank_importance(raw: Vec<(String, f64)>) -> Vec<FeatureImportance> {
    let mut raw = raw;
    raw.sort_by(|a, b| b.1.total_cmp(&a.1));

    let total: f64 = raw.iter().map(|(_, v)| v).sum();
    let max = raw.first().map_or(0.0, |(_, v)| *v);

    raw.into_iter()
        .map(|(variable, relative_importance)| FeatureImportance {
            variable,
            relative_importance,
            scaled_importance: if max > 0.0 {
                relative_importance / max
            } else {
                0.0
            },
            percentage: if total > 0.0 {
                relative_importance / total
            } else {
                0.0
            },
        })
        .collect()
}

/// Trains a model on the given features and reports its performance.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates `feature_keys` against `target` on `frame`.
    ///
    /// # Errors
    ///
    /// Returns a description of why training or evaluation failed;
    /// the orchestrator treats this as fatal for the run.
    async fn evaluate(
        &self,
        frame: &Frame,
        feature_keys: &[String],
        target: &str,
        task: Task,
    ) -> Result<EvalReport, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rank_importance_sorts_and_normalizes() {
        let ranked = rank_importance(vec![
            ("a".to_string(), 1.0),
            ("b".to_string(), 3.0),
            ("c".to_string(), 0.0),
        ]);

        assert_eq!(ranked[0].variable, "b");
        assert_eq!(ranked[1].variable, "a");
        assert_eq!(ranked[2].variable, "c");
        assert!((ranked[0].scaled_importance - 1.0).abs() < 1e-12);
        assert!((ranked[0].percentage - 0.75).abs() < 1e-12);

        let sum: f64 = ranked.iter().map(|f| f.percentage).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rank_importance_zero_total_yields_zero_percentages() {
        let ranked = rank_importance(vec![
            ("a".to_string(), 0.0),
            ("b".to_string(), 0.0),
        ]);
        assert!(ranked.iter().all(|f| f.percentage == 0.0));
        assert!(ranked.iter().all(|f| f.scaled_importance == 0.0));
    }

    #[test]
    fn regression_metrics_serialize_with_report_keys() {
        let metrics = Metrics::Regression(RegressionMetrics {
            mse: 4.0,
            rmse: 2.0,
            r2: 0.9,
            n_obs: 80,
        });
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["MSE"], 4.0);
        assert_eq!(json["N Obs"], 80);
    }

    #[test]
    fn task_display() {
        assert_eq!(Task::Regression.to_string(), "regression");
        assert_eq!(Task::Classification.to_string(), "classification");
    }
}
