pub mod checkpoint;
pub mod gbdt;
pub mod loss;
pub mod tree;

use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,

    /// Maximum tree depth
    pub max_depth: usize,

    /// Shrinkage applied to every leaf value
    pub learning_rate: f64,

    /// L2 regularisation on leaf values
    pub lambda: f64,

    /// Minimum split loss reduction
    pub gamma: f64,

    /// Minimum hessian sum in a child
    pub min_child_weight: f64,

    /// Fraction of rows sampled for each tree
    pub subsample: f64,

    /// Weight on positive-class gradients; 1.0 leaves the loss unweighted
    pub scale_pos_weight: f64,

    /// Seed for row subsampling
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::driver_default()
    }
}

impl ModelConfig {
    /// Shallow, slow-learning ensemble used for driver classification
    pub fn driver_default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            scale_pos_weight: 1.0,
            seed: 42,
        }
    }

    /// Small ensemble for quick runs and tests
    pub fn quick_test() -> Self {
        Self {
            n_estimators: 10,
            learning_rate: 0.3,
            ..Self::driver_default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_scale_pos_weight(mut self, scale_pos_weight: f64) -> Self {
        self.scale_pos_weight = scale_pos_weight;
        self
    }
}
