//! Deterministic in-crate evaluator.
//!
//! Ridge least squares for regression, nearest-centroid for
//! classification. Rows with a missing or non-finite cell in any
//! requested feature or in the target are dropped before fitting; the
//! train/test split is a fixed modular pattern, so the same inputs
//! always produce the same report (apart from the model id).

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    rank_importance, ClassificationMetrics, EvalReport, Evaluator, Metrics, Performance,
    RegressionMetrics, Task,
};
use crate::frame::Frame;

/// Deterministic linear evaluator.
#[derive(Debug, Clone)]
pub struct LinearEvaluator {
    /// Ridge penalty added to the normal equations diagonal.
    ridge_lambda: f64,
    /// Every `test_modulus`-th row is held out for testing.
    test_modulus: usize,
}

impl Default for LinearEvaluator {
    fn default() -> Self {
        Self {
            ridge_lambda: 1e-6,
            test_modulus: 5,
        }
    }
}

impl LinearEvaluator {
    /// Creates an evaluator with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ridge penalty.
    #[must_use]
    pub fn with_ridge_lambda(mut self, lambda: f64) -> Self {
        self.ridge_lambda = lambda;
        self
    }

    /// Sets the hold-out modulus (minimum 2).
    #[must_use]
    pub fn with_test_modulus(mut self, modulus: usize) -> Self {
        self.test_modulus = modulus.max(2);
        self
    }
}

struct Split {
    train_x: Vec<Vec<f64>>,
    train_y: Vec<f64>,
    test_x: Vec<Vec<f64>>,
    test_y: Vec<f64>,
}

#[async_trait]
impl Evaluator for LinearEvaluator {
    async fn evaluate(
        &self,
        frame: &Frame,
        feature_keys: &[String],
        target: &str,
        task: Task,
    ) -> Result<EvalReport, String> {
        if feature_keys.is_empty() {
            return Err("no feature keys provided".to_string());
        }
        let split = self.assemble(frame, feature_keys, target)?;

        let (performance, raw_importance) = match task {
            Task::Regression => self.fit_regression(&split, feature_keys)?,
            Task::Classification => fit_classification(&split, feature_keys)?,
        };

        let feature_importance = rank_importance(raw_importance);
        let model_type = format!("linear_{task}");
        let model_id = format!(
            "linear_{}_{}",
            &Uuid::new_v4().simple().to_string()[..8],
            chrono::Utc::now().timestamp()
        );

        let top = feature_importance
            .first()
            .map_or("(none)", |f| f.variable.as_str());
        let narrative = match &performance.test {
            Metrics::Regression(m) => format!(
                "{model_type} achieved R\u{b2}={:.3} on test data. Top feature: {top}.",
                m.r2
            ),
            Metrics::Classification(m) => format!(
                "{model_type} achieved Accuracy={:.3} on test data. Top feature: {top}.",
                m.accuracy
            ),
        };

        Ok(EvalReport {
            model_id,
            model_type,
            performance,
            feature_importance,
            narrative,
        })
    }
}

impl LinearEvaluator {
    fn assemble(
        &self,
        frame: &Frame,
        feature_keys: &[String],
        target: &str,
    ) -> Result<Split, String> {
        let target_col = frame
            .column(target)
            .ok_or_else(|| format!("target column '{target}' not found"))?;
        let feature_cols = feature_keys
            .iter()
            .map(|k| {
                frame
                    .column(k)
                    .ok_or_else(|| format!("feature column '{k}' not found"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut split = Split {
            train_x: Vec::new(),
            train_y: Vec::new(),
            test_x: Vec::new(),
            test_y: Vec::new(),
        };

        let mut kept = 0usize;
        for row in 0..frame.n_rows() {
            let y = match target_col.values[row] {
                Some(v) if v.is_finite() => v,
                _ => continue,
            };
            let mut x = Vec::with_capacity(feature_cols.len());
            let mut complete = true;
            for col in &feature_cols {
                match col.values[row] {
                    Some(v) if v.is_finite() => x.push(v),
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                continue;
            }
            if kept % self.test_modulus == 0 {
                split.test_x.push(x);
                split.test_y.push(y);
            } else {
                split.train_x.push(x);
                split.train_y.push(y);
            }
            kept += 1;
        }

        if split.train_y.is_empty() || split.test_y.is_empty() {
            return Err(format!(
                "not enough complete rows to split: {} train, {} test",
                split.train_y.len(),
                split.test_y.len()
            ));
        }
        Ok(split)
    }

    fn fit_regression(
        &self,
        split: &Split,
        feature_keys: &[String],
    ) -> Result<(Performance, Vec<(String, f64)>), String> {
        let p = feature_keys.len();
        let n = split.train_y.len();

        // Normal equations over [1, x...] with a ridge diagonal.
        let dim = p + 1;
        let mut a = vec![vec![0.0f64; dim]; dim];
        let mut b = vec![0.0f64; dim];
        for (x, &y) in split.train_x.iter().zip(&split.train_y) {
            let mut row = Vec::with_capacity(dim);
            row.push(1.0);
            row.extend_from_slice(x);
            for i in 0..dim {
                for j in 0..dim {
                    a[i][j] += row[i] * row[j];
                }
                b[i] += row[i] * y;
            }
        }
        for (i, row) in a.iter_mut().enumerate().skip(1) {
            row[i] += self.ridge_lambda;
        }

        let beta = solve(a, b).ok_or("normal equations are singular")?;

        let predict = |x: &[f64]| {
            beta[0]
                + x.iter()
                    .zip(&beta[1..])
                    .map(|(xi, bi)| xi * bi)
                    .sum::<f64>()
        };
        let train = regression_metrics(&split.train_x, &split.train_y, predict);
        let test = regression_metrics(&split.test_x, &split.test_y, predict);

        // Importance: coefficient magnitude scaled by the feature's
        // spread on the training split.
        let importance = feature_keys
            .iter()
            .enumerate()
            .map(|(j, key)| {
                let mean = split.train_x.iter().map(|x| x[j]).sum::<f64>() / n as f64;
                let var = split
                    .train_x
                    .iter()
                    .map(|x| (x[j] - mean).powi(2))
                    .sum::<f64>()
                    / n as f64;
                (key.clone(), beta[j + 1].abs() * var.sqrt())
            })
            .collect();

        Ok((
            Performance {
                train: Metrics::Regression(train),
                test: Metrics::Regression(test),
            },
            importance,
        ))
    }
}

fn regression_metrics(
    xs: &[Vec<f64>],
    ys: &[f64],
    predict: impl Fn(&[f64]) -> f64,
) -> RegressionMetrics {
    let n = ys.len();
    let mean = ys.iter().sum::<f64>() / n as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, &y) in xs.iter().zip(ys) {
        ss_res += (y - predict(x)).powi(2);
        ss_tot += (y - mean).powi(2);
    }
    let mse = ss_res / n as f64;
    RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        r2: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
        n_obs: n,
    }
}

fn fit_classification(
    split: &Split,
    feature_keys: &[String],
) -> Result<(Performance, Vec<(String, f64)>), String> {
    let mut classes: Vec<f64> = split.train_y.clone();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    if classes.len() < 2 {
        return Err("target has fewer than two classes in the training split".to_string());
    }

    let p = feature_keys.len();
    let mut centroids = vec![vec![0.0f64; p]; classes.len()];
    let mut counts = vec![0usize; classes.len()];
    for (x, &y) in split.train_x.iter().zip(&split.train_y) {
        // Training classes are deduped from the same values, so the
        // lookup cannot miss.
        if let Some(c) = classes.iter().position(|&cl| cl == y) {
            for (acc, xi) in centroids[c].iter_mut().zip(x) {
                *acc += xi;
            }
            counts[c] += 1;
        }
    }
    for (centroid, &count) in centroids.iter_mut().zip(&counts) {
        for v in centroid.iter_mut() {
            *v /= count as f64;
        }
    }

    let train = classification_metrics(&split.train_x, &split.train_y, &classes, &centroids);
    let test = classification_metrics(&split.test_x, &split.test_y, &classes, &centroids);

    // Importance: spread of the class centroids along each feature.
    let importance = feature_keys
        .iter()
        .enumerate()
        .map(|(j, key)| {
            let mean =
                centroids.iter().map(|c| c[j]).sum::<f64>() / centroids.len() as f64;
            let between = centroids
                .iter()
                .map(|c| (c[j] - mean).powi(2))
                .sum::<f64>()
                / centroids.len() as f64;
            (key.clone(), between.sqrt())
        })
        .collect();

    Ok((
        Performance {
            train: Metrics::Classification(train),
            test: Metrics::Classification(test),
        },
        importance,
    ))
}

fn classification_metrics(
    xs: &[Vec<f64>],
    ys: &[f64],
    classes: &[f64],
    centroids: &[Vec<f64>],
) -> ClassificationMetrics {
    const CLIP: f64 = 1e-15;
    let n = ys.len();
    let mut correct = 0usize;
    let mut nll = 0.0f64;

    for (x, &y) in xs.iter().zip(ys) {
        let dists: Vec<f64> = centroids
            .iter()
            .map(|c| {
                c.iter()
                    .zip(x)
                    .map(|(ci, xi)| (ci - xi).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        // Softmax over negative distances as class probabilities.
        let max_neg = dists.iter().map(|d| -d).fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = dists.iter().map(|d| (-d - max_neg).exp()).collect();
        let z: f64 = exps.iter().sum();

        let predicted = dists
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i);
        if classes[predicted] == y {
            correct += 1;
        }

        let true_idx = classes.iter().position(|&c| c == y);
        let p_true = true_idx.map_or(CLIP, |i| (exps[i] / z).clamp(CLIP, 1.0 - CLIP));
        nll -= p_true.ln();
    }

    ClassificationMetrics {
        accuracy: correct as f64 / n as f64,
        log_loss: nll / n as f64,
        n_obs: n,
    }
}

/// Solves `a x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let acc: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - acc) / a[row][row];
    }
    Some(x)
}
