use crate::data::loader::load_feature_matrix;
use crate::data::FeatureMatrix;
use crate::model::checkpoint::{ModelArtifact, ModelSaver};
use crate::predict::{sort_by_probability, write_predictions, GenePrediction};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Applies a trained model to new feature matrices
pub struct Predictor {
    artifact: ModelArtifact,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Load a model written by the trainer
    pub fn from_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self> {
        let artifact = ModelSaver::load(path)?;
        Ok(Self::new(artifact))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Read the model's feature columns from a matrix file
    ///
    /// Other columns, including any label, are ignored.
    pub fn load_features<P: AsRef<Path>>(&self, path: P) -> Result<FeatureMatrix> {
        load_feature_matrix(path, &self.artifact.feature_names(), false)
    }

    /// Score every row, ranked by probability
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<GenePrediction>> {
        let probabilities = self
            .artifact
            .model
            .predict_proba(matrix.values.view())
            .context("Prediction failed")?;

        let mut predictions: Vec<GenePrediction> = matrix
            .genes
            .iter()
            .zip(probabilities)
            .map(|(gene, p)| GenePrediction::new(gene.clone(), p))
            .collect();
        sort_by_probability(&mut predictions);
        Ok(predictions)
    }

    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<GenePrediction>> {
        let matrix = self.load_features(path)?;
        info!("Scoring {} genes", matrix.len());
        self.predict(&matrix)
    }

    /// Score a matrix file and write `Gene,Prediction_Prob`
    ///
    /// Nothing is written when the input lacks a model column.
    pub fn predict_to_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<Vec<GenePrediction>> {
        let predictions = self.predict_file(input)?;
        write_predictions(&predictions, output)?;
        Ok(predictions)
    }
}
