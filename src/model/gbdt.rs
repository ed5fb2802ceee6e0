use crate::error::PipelineError;
use crate::model::loss::{sigmoid, LogisticLoss};
use crate::model::tree::{RegressionTree, TreeParams};
use crate::model::ModelConfig;
use crate::utils::random::seeded_rng;
use anyhow::Result;
use indicatif::ProgressBar;
use ndarray::{Array1, ArrayView2};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Gradient-boosted tree ensemble for binary classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: ModelConfig,
    base_margin: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedClassifier {
    /// Create an unfitted classifier
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            base_margin: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    /// Fit on rows of `x` against 0/1 labels
    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[u8]) -> Result<()> {
        self.fit_with_progress(x, y, &ProgressBar::hidden())
    }

    /// Fit, advancing `progress` once per boosting round
    pub fn fit_with_progress(
        &mut self,
        x: ArrayView2<f64>,
        y: &[u8],
        progress: &ProgressBar,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: x.nrows(),
                actual: y.len(),
            }
            .into());
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(PipelineError::insufficient_data("empty training matrix").into());
        }

        let loss = LogisticLoss::new(self.config.scale_pos_weight);
        let params = TreeParams::from(&self.config);
        let n = x.nrows();
        let n_sampled = ((n as f64 * self.config.subsample).ceil() as usize).clamp(1, n);
        let mut rng = seeded_rng(self.config.seed);
        let mut all_rows: Vec<usize> = (0..n).collect();

        self.base_margin = loss.base_margin(y);
        self.n_features = x.ncols();
        self.trees = Vec::with_capacity(self.config.n_estimators);

        info!(
            "Fitting {} trees (max_depth={}, learning_rate={}, scale_pos_weight={}) on {} rows",
            self.config.n_estimators,
            self.config.max_depth,
            self.config.learning_rate,
            self.config.scale_pos_weight,
            n
        );
        progress.set_length(self.config.n_estimators as u64);

        let mut margins = vec![self.base_margin; n];
        for round in 0..self.config.n_estimators {
            let (grad, hess) = loss.gradients(&margins, y);

            let rows: Vec<usize> = if n_sampled < n {
                all_rows.shuffle(&mut rng);
                let mut rows = all_rows[..n_sampled].to_vec();
                rows.sort_unstable();
                rows
            } else {
                all_rows.clone()
            };

            let tree = RegressionTree::fit(x, &grad, &hess, &rows, &params);
            for (i, margin) in margins.iter_mut().enumerate() {
                *margin += tree.predict_row(x.row(i));
            }
            self.trees.push(tree);

            if round % 10 == 0 {
                let probs: Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
                debug!(
                    "Round {}: train log loss {:.5}",
                    round + 1,
                    crate::model::loss::metrics::log_loss(y, &probs)
                );
            }
            progress.inc(1);
        }

        Ok(())
    }

    /// Raw additive scores
    pub fn predict_margin(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted.into());
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            }
            .into());
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_margin + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    /// Probability of the positive class for each row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        Ok(self.predict_margin(x)?.iter().map(|&m| sigmoid(m)).collect())
    }

    /// Check internal consistency after deserialisation
    pub fn validate(&self) -> Result<()> {
        let max_feature = self.trees.iter().filter_map(|t| t.max_feature()).max();
        if let Some(feature) = max_feature {
            if feature >= self.n_features {
                return Err(PipelineError::FeatureMismatch {
                    expected: self.n_features,
                    actual: feature + 1,
                }
                .into());
            }
        }
        Ok(())
    }
}
