use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::PipelineError;
use crate::model::gbdt::GradientBoostedClassifier;
use crate::model::ModelConfig;
use crate::utils::ensure_parent_dir;

/// Held-out evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    /// Mean log loss
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Average precision; absent when the evaluated set has no positives
    pub auprc: Option<f64>,
}

/// Negative and positive row counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl From<(usize, usize)> for ClassCounts {
    fn from((negative, positive): (usize, usize)) -> Self {
        Self { negative, positive }
    }
}

/// Description of a trained model, written next to it as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that produced the model
    pub version: String,
    /// Ordered feature columns the model was fitted on
    pub feature_names: Vec<String>,
    pub model_config: ModelConfig,
    pub test_metrics: Metrics,
    pub train_counts: ClassCounts,
    /// Training counts after oversampling
    pub resampled_counts: ClassCounts,
    pub test_counts: ClassCounts,
}

/// Fitted model plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: GradientBoostedClassifier,
}

impl ModelArtifact {
    pub fn feature_names(&self) -> Vec<&str> {
        self.metadata.feature_names.iter().map(String::as_str).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.metadata.feature_names.len() != self.model.n_features() {
            return Err(PipelineError::FeatureMismatch {
                expected: self.model.n_features(),
                actual: self.metadata.feature_names.len(),
            }
            .into());
        }
        self.model.validate()
    }
}

/// Path of the JSON metadata sidecar for a model file
pub fn metadata_path<P: AsRef<Path>>(path: P) -> PathBuf {
    path.as_ref().with_extension("json")
}

/// Model persistence
pub struct ModelSaver;

impl ModelSaver {
    /// Write the artifact as bincode plus a pretty JSON metadata sidecar
    pub fn save<P: AsRef<Path>>(artifact: &ModelArtifact, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create model file: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, artifact).context("Failed to serialize model")?;
        writer.flush().context("Failed to write model file")?;

        let sidecar = metadata_path(path);
        let metadata_json = serde_json::to_string_pretty(&artifact.metadata)
            .context("Failed to serialize metadata")?;
        fs::write(&sidecar, metadata_json)
            .with_context(|| format!("Failed to write metadata file: {:?}", sidecar))?;

        info!("Saved model: {:?} (metadata: {:?})", path, sidecar);
        Ok(())
    }

    /// Load an artifact written by [`ModelSaver::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ModelArtifact> {
        let path = path.as_ref();
        info!("Loading model from {:?}", path);

        let file = File::open(path)
            .with_context(|| format!("Failed to open model file: {:?}", path))?;
        let artifact: ModelArtifact = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Failed to decode model file: {:?}", path))?;
        artifact.validate().context("Model file is inconsistent")?;

        info!(
            "Loaded model v{} with {} trees over {:?}",
            artifact.metadata.version,
            artifact.model.n_trees(),
            artifact.metadata.feature_names
        );
        Ok(artifact)
    }
}
