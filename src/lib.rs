//! # drivergene: Cancer Driver Gene Prediction
//!
//! drivergene ranks genes by their likelihood of being cancer drivers using
//! per-gene statistics derived from somatic mutation and structural-variant
//! (SV) calls.
//!
//! ## Features
//!
//! - Per-gene mutation burden, truncating fraction, VAF and position spread
//! - SV occurrence, in-frame fusion fraction and partner-network degree
//! - Stratified hold-out with SMOTE oversampling of the training rows
//! - Gradient-boosted tree classifier evaluated by AUPRC
//! - Ranked driver report and batch scoring of new cohorts
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use drivergene::config::PipelineConfig;
//! use drivergene::data::feature_engineering::{write_feature_matrix, FeatureBuilder};
//! use drivergene::data::loader::{load_mutations, load_structural_variants};
//! use drivergene::training::{trainer::Trainer, TrainingConfig};
//!
//! let config = PipelineConfig::load("config/config.yaml").unwrap();
//!
//! // Build features
//! let mutations = load_mutations("data/mutations.maf").unwrap();
//! let svs = load_structural_variants("data/sv.tsv").unwrap();
//! let rows = FeatureBuilder::from_config(&config).build(&mutations, &svs);
//! write_feature_matrix(&rows, "results/features.csv").unwrap();
//!
//! // Train
//! let set = Trainer::load_training_set("results/features.csv").unwrap();
//! let result = Trainer::new(TrainingConfig::from(&config)).train(&set).unwrap();
//! println!("{:?}", result.artifact.metadata.test_metrics);
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod predict;
pub mod report;
pub mod training;
pub mod utils;

/// Re-export commonly used types
pub use config::PipelineConfig;
pub use data::{FeatureMatrix, GeneFeatures, MutationRecord, SvRecord};
pub use error::PipelineError;
pub use model::{gbdt::GradientBoostedClassifier, ModelConfig};
pub use predict::GenePrediction;
pub use report::DriverReport;
pub use training::{TrainingConfig, TrainingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{} - cancer driver gene prediction", NAME, VERSION)
}
