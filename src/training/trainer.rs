use crate::data::loader::load_feature_matrix;
use crate::data::preprocessing::{stratified_split, to_labeled_set, Smote};
use crate::data::{LabeledSet, MODEL_FEATURES};
use crate::model::checkpoint::{ClassCounts, Metrics, ModelArtifact, ModelMetadata, ModelSaver};
use crate::model::gbdt::GradientBoostedClassifier;
use crate::model::loss::metrics as loss_metrics;
use crate::predict::{write_predictions, GenePrediction};
use crate::training::{TrainingConfig, TrainingResult};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const DECISION_THRESHOLD: f64 = 0.5;

/// Trainer for the driver classifier
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Create new trainer
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Read the labelled model columns of a feature matrix
    pub fn load_training_set<P: AsRef<Path>>(path: P) -> Result<LabeledSet> {
        let matrix = load_feature_matrix(path, &MODEL_FEATURES, true)?;
        info!(
            "Loaded {} genes ({} known drivers)",
            matrix.len(),
            matrix.positive_count()
        );
        to_labeled_set(matrix)
    }

    /// Split, oversample the training rows, fit and evaluate on the held-out rows
    pub fn train(&self, set: &LabeledSet) -> Result<TrainingResult> {
        info!("Starting training with configuration: {:?}", self.config);
        let start_time = Instant::now();

        let dataset = stratified_split(set, &self.config.split())?;

        let smote = Smote::new(self.config.smote_k_neighbors, self.config.seed);
        let resampled = smote.fit_resample(&dataset.train)?;

        let (neg, pos) = resampled.class_counts();
        let ratio = if pos > 0 { neg as f64 / pos as f64 } else { 0.0 };
        info!(
            "Negative/positive ratio after oversampling: {:.2} (scale_pos_weight={})",
            ratio, self.config.model.scale_pos_weight
        );

        let mut model = GradientBoostedClassifier::new(self.config.model.clone());
        let progress = self.progress_bar();
        model
            .fit_with_progress(resampled.features.view(), &resampled.labels, &progress)
            .context("Failed to fit classifier")?;
        progress.finish_and_clear();

        let probabilities = model
            .predict_proba(dataset.test.features.view())
            .context("Failed to score test genes")?;
        let test_metrics = evaluate(&dataset.test.labels, &probabilities);
        log_metrics(&test_metrics);

        let predictions = dataset
            .test
            .genes
            .iter()
            .zip(&dataset.test.labels)
            .zip(&probabilities)
            .map(|((gene, &label), &p)| GenePrediction::labelled(gene.clone(), p, label))
            .collect();

        let metadata = ModelMetadata {
            version: crate::VERSION.to_string(),
            feature_names: MODEL_FEATURES.iter().map(|s| s.to_string()).collect(),
            model_config: self.config.model.clone(),
            test_metrics,
            train_counts: ClassCounts::from(dataset.train.class_counts()),
            resampled_counts: ClassCounts::from(resampled.class_counts()),
            test_counts: ClassCounts::from(dataset.test.class_counts()),
        };

        let duration = start_time.elapsed().as_secs_f64();
        info!(
            "Training finished in {}",
            crate::utils::format_duration(duration)
        );

        Ok(TrainingResult {
            artifact: ModelArtifact { metadata, model },
            predictions,
            duration_secs: duration,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(self.config.model.n_estimators as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} trees")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }
}

/// Metrics of probabilities against 0/1 labels
pub fn evaluate(labels: &[u8], probabilities: &[f64]) -> Metrics {
    Metrics {
        loss: loss_metrics::log_loss(labels, probabilities),
        accuracy: loss_metrics::accuracy(labels, probabilities, DECISION_THRESHOLD),
        precision: loss_metrics::precision(labels, probabilities, DECISION_THRESHOLD),
        recall: loss_metrics::recall(labels, probabilities, DECISION_THRESHOLD),
        f1: loss_metrics::f1_score(labels, probabilities, DECISION_THRESHOLD),
        auprc: loss_metrics::average_precision(labels, probabilities),
    }
}

fn log_metrics(metrics: &Metrics) {
    info!("=== Test Metrics ===");
    match metrics.auprc {
        Some(auprc) => info!("  AUPRC: {:.4}", auprc),
        None => warn!("  AUPRC: undefined (no positive genes in the test set)"),
    }
    info!("  Log loss: {:.4}", metrics.loss);
    info!("  Accuracy: {:.4}", metrics.accuracy);
    info!("  Precision: {:.4}", metrics.precision);
    info!("  Recall: {:.4}", metrics.recall);
    info!("  F1: {:.4}", metrics.f1);
}

/// Load, train and persist the model plus its held-out predictions
pub fn train_model(
    feature_matrix: &Path,
    model_out: &Path,
    predictions_out: &Path,
    config: TrainingConfig,
) -> Result<TrainingResult> {
    let set = Trainer::load_training_set(feature_matrix)?;
    let result = Trainer::new(config).train(&set).context("Training failed")?;

    ModelSaver::save(&result.artifact, model_out)?;
    write_predictions(&result.predictions, predictions_out)?;
    Ok(result)
}
