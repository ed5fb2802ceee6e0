pub mod predictor;

use crate::data::loader::{open_input, ColumnIndex, FileFormat};
use crate::data::GENE_COLUMN;
use crate::error::PipelineError;
use crate::utils::ensure_parent_dir;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;
use tracing::info;

pub const PROBABILITY_COLUMN: &str = "Prediction_Prob";
pub const TRUE_LABEL_COLUMN: &str = "True_Label";

/// Prediction result for a single gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenePrediction {
    pub gene: String,
    /// Probability of being a driver
    pub probability: f64,
    /// Known label, when the gene was scored from a labelled table
    pub true_label: Option<u8>,
}

impl GenePrediction {
    pub fn new(gene: impl Into<String>, probability: f64) -> Self {
        Self {
            gene: gene.into(),
            probability,
            true_label: None,
        }
    }

    pub fn labelled(gene: impl Into<String>, probability: f64, label: u8) -> Self {
        Self {
            true_label: Some(label),
            ..Self::new(gene, probability)
        }
    }
}

/// Highest probability first; equal probabilities by gene name
pub fn compare_ranked(a: &GenePrediction, b: &GenePrediction) -> Ordering {
    b.probability
        .total_cmp(&a.probability)
        .then_with(|| a.gene.cmp(&b.gene))
}

pub fn sort_by_probability(predictions: &mut [GenePrediction]) {
    predictions.sort_by(compare_ranked);
}

/// Write predictions as CSV
///
/// The `True_Label` column is written only when every prediction carries one.
pub fn write_predictions<P: AsRef<Path>>(predictions: &[GenePrediction], path: P) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let with_labels =
        !predictions.is_empty() && predictions.iter().all(|p| p.true_label.is_some());

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create predictions file: {:?}", path))?;

    if with_labels {
        writer.write_record([GENE_COLUMN, TRUE_LABEL_COLUMN, PROBABILITY_COLUMN])?;
    } else {
        writer.write_record([GENE_COLUMN, PROBABILITY_COLUMN])?;
    }

    for prediction in predictions {
        let probability = prediction.probability.to_string();
        match prediction.true_label.filter(|_| with_labels) {
            Some(label) => writer.write_record([
                prediction.gene.as_str(),
                label.to_string().as_str(),
                probability.as_str(),
            ])?,
            None => writer.write_record([prediction.gene.as_str(), probability.as_str()])?,
        }
    }
    writer.flush().context("Failed to flush predictions file")?;

    info!("Wrote {} predictions to {:?}", predictions.len(), path);
    Ok(())
}

/// Load a predictions CSV (`Gene`, `Prediction_Prob`, optional `True_Label`)
pub fn load_predictions<P: AsRef<Path>>(path: P) -> Result<Vec<GenePrediction>> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path, FileFormat::Csv);
    let reader = open_input(path, format)?;
    parse_predictions(reader, format.delimiter())
        .with_context(|| format!("Failed to load predictions {:?}", path))
}

pub fn parse_predictions<R: Read>(reader: R, delimiter: u8) -> Result<Vec<GenePrediction>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(reader);

    let index = ColumnIndex::new("predictions table", csv_reader.headers()?);
    let gene_idx = index.require(GENE_COLUMN)?;
    let prob_idx = index.require(PROBABILITY_COLUMN)?;
    let label_idx = index.find(TRUE_LABEL_COLUMN);

    let mut predictions = Vec::new();
    for result in csv_reader.records() {
        let record = result.context("Failed to parse predictions record")?;
        let line = record.position().map_or(0, |p| p.line());
        let invalid = |column: &str, value: &str| PipelineError::InvalidValue {
            column: column.to_string(),
            value: value.to_string(),
            line,
        };

        let gene = record.get(gene_idx).unwrap_or_default().to_string();
        let raw_prob = record.get(prob_idx).unwrap_or_default();
        let probability = raw_prob
            .parse::<f64>()
            .ok()
            .filter(|p| (0.0..=1.0).contains(p))
            .ok_or_else(|| invalid(PROBABILITY_COLUMN, raw_prob))?;

        let true_label = match label_idx.and_then(|idx| record.get(idx)) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v == 0.0 => Some(0),
                Ok(v) if v == 1.0 => Some(1),
                _ => return Err(invalid(TRUE_LABEL_COLUMN, raw).into()),
            },
            None => None,
        };

        predictions.push(GenePrediction {
            gene,
            probability,
            true_label,
        });
    }

    Ok(predictions)
}

/// Print the highest-ranked candidates to stdout
pub fn print_top_candidates(predictions: &[GenePrediction], n: usize) {
    let mut ranked = predictions.to_vec();
    sort_by_probability(&mut ranked);

    println!("\n=== Top {} Candidate Driver Genes ===", n.min(ranked.len()));
    for (rank, prediction) in ranked.iter().take(n).enumerate() {
        println!("{:>3}. {:<15} {:.4}", rank + 1, prediction.gene, prediction.probability);
    }
    println!();
}
