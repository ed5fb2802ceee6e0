pub mod trainer;

use crate::config::PipelineConfig;
use crate::data::preprocessing::SplitConfig;
use crate::model::checkpoint::ModelArtifact;
use crate::model::ModelConfig;
use crate::predict::GenePrediction;
use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of genes held out for evaluation
    pub test_size: f64,
    /// Seed for the split and the oversampler
    pub seed: u64,
    /// Neighbours used when synthesising minority rows
    pub smote_k_neighbors: usize,
    /// Ensemble hyperparameters
    pub model: ModelConfig,
    /// Show a progress bar over boosting rounds
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            smote_k_neighbors: 5,
            model: ModelConfig::driver_default(),
            show_progress: false,
        }
    }
}

impl TrainingConfig {
    /// Create configuration for quick testing
    pub fn quick_test() -> Self {
        Self {
            model: ModelConfig::quick_test(),
            ..Default::default()
        }
    }

    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            test_size: self.test_size,
            seed: self.seed,
        }
    }
}

impl From<&PipelineConfig> for TrainingConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            test_size: config.test_size,
            seed: config.random_seed,
            smote_k_neighbors: config.smote_k_neighbors,
            model: config.model.clone().with_seed(config.random_seed),
            show_progress: false,
        }
    }
}

/// Training result
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Fitted model with metadata
    pub artifact: ModelArtifact,
    /// Held-out predictions, in test-partition order
    pub predictions: Vec<GenePrediction>,
    /// Training duration in seconds
    pub duration_secs: f64,
}
