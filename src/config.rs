//! Pipeline configuration.
//!
//! A single YAML file (by default `config/config.yaml`) carries the static
//! inputs shared by every stage: coding-sequence lengths, the gold-standard
//! driver list and the training hyperparameters. It is loaded once per process
//! and handed to each stage explicitly.

use crate::error::PipelineError;
use crate::model::ModelConfig;
use crate::utils::validation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Coding-sequence length per gene symbol
    #[serde(rename = "GENE_CDS_LENGTHS", default)]
    pub gene_cds_lengths: HashMap<String, u64>,

    /// Gold-standard driver gene symbols
    #[serde(rename = "GOLD_STANDARD_DRIVERS", default)]
    pub gold_standard_drivers: Vec<String>,

    /// Fraction of genes held out for evaluation
    #[serde(rename = "TEST_SIZE", default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the split, oversampling and model fitting
    #[serde(rename = "RANDOM_SEED", default = "default_seed")]
    pub random_seed: u64,

    /// Neighbours considered when synthesising minority examples
    #[serde(rename = "SMOTE_K_NEIGHBORS", default = "default_k_neighbors")]
    pub smote_k_neighbors: usize,

    /// Gradient boosting hyperparameters
    #[serde(rename = "MODEL", default)]
    pub model: ModelConfig,
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_k_neighbors() -> usize {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gene_cds_lengths: HashMap::new(),
            gold_standard_drivers: Vec::new(),
            test_size: default_test_size(),
            random_seed: default_seed(),
            smote_k_neighbors: default_k_neighbors(),
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::MissingConfig {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse configuration {:?}", path))?;

        info!(
            "Loaded configuration from {:?}: {} CDS lengths, {} gold-standard drivers",
            path,
            config.gene_cds_lengths.len(),
            config.gold_standard_drivers.len()
        );
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        debug!("Configuration: {:?}", config.model);
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::invalid_config("TEST_SIZE", self.test_size).into());
        }
        if self.smote_k_neighbors == 0 {
            return Err(PipelineError::invalid_config("SMOTE_K_NEIGHBORS", 0).into());
        }
        validation::positive(self.model.n_estimators, "MODEL.n_estimators")?;
        validation::positive(self.model.max_depth, "MODEL.max_depth")?;
        validation::in_range(self.model.learning_rate, f64::EPSILON, 1.0, "MODEL.learning_rate")?;
        validation::in_range(self.model.lambda, 0.0, f64::MAX, "MODEL.lambda")?;
        validation::positive(self.model.scale_pos_weight, "MODEL.scale_pos_weight")?;
        validation::in_range(self.model.subsample, f64::EPSILON, 1.0, "MODEL.subsample")?;
        Ok(())
    }

    /// Gold-standard drivers as a lookup set
    pub fn driver_set(&self) -> HashSet<String> {
        self.gold_standard_drivers.iter().cloned().collect()
    }
}

/// Resolve the configuration path from an optional CLI override
pub fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
GENE_CDS_LENGTHS:
  TP53: 1182
  KRAS: 567
GOLD_STANDARD_DRIVERS:
  - TP53
  - KRAS
TEST_SIZE: 0.25
RANDOM_SEED: 7
"#;

    #[test]
    fn test_parse_upper_case_keys() {
        let config = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.gene_cds_lengths.get("TP53"), Some(&1182));
        assert_eq!(config.gold_standard_drivers.len(), 2);
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.smote_k_neighbors, 5);
        assert_eq!(config.model.n_estimators, 100);
        assert_eq!(config.model.max_depth, 3);
        assert!(config.driver_set().contains("KRAS"));
    }

    #[test]
    fn test_model_block_override() {
        let yaml = format!("{}MODEL:\n  n_estimators: 10\n  learning_rate: 0.3\n", SAMPLE);
        let config = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.model.n_estimators, 10);
        assert_eq!(config.model.learning_rate, 0.3);
        assert_eq!(config.model.max_depth, 3);
    }

    #[test]
    fn test_rejects_bad_test_size() {
        let err = PipelineConfig::from_yaml_str("TEST_SIZE: 1.5\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.random_seed, 7);
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            resolve_path(Some(Path::new("other.yaml"))),
            PathBuf::from("other.yaml")
        );
    }
}
