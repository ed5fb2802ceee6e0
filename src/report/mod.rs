//! Ranked summary of scored genes against the gold-standard driver list.

use crate::model::loss::metrics;
use crate::predict::{load_predictions, sort_by_probability, GenePrediction};
use crate::utils::ensure_parent_dir;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_RECOVERY_K: usize = 50;

/// One row of the ranked table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedGene {
    /// 1-based rank
    pub rank: usize,
    pub gene: String,
    pub probability: f64,
    pub true_label: Option<u8>,
    pub is_known_driver: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    pub ranked: Vec<RankedGene>,
    /// Average precision over all scored genes
    pub auprc: Option<f64>,
    pub top_n: usize,
    pub recovery_k: usize,
    /// Known drivers anywhere in the scored set
    pub total_known_drivers: usize,
    /// Known drivers within the first `recovery_k` ranks
    pub recovered_in_top_k: usize,
}

impl DriverReport {
    /// Rank predictions and annotate them with driver membership
    ///
    /// AUPRC uses `True_Label` when every prediction carries one, otherwise
    /// membership in `drivers` stands in for the label.
    pub fn build(
        mut predictions: Vec<GenePrediction>,
        drivers: &HashSet<String>,
        top_n: usize,
        recovery_k: usize,
    ) -> Self {
        sort_by_probability(&mut predictions);

        let ranked: Vec<RankedGene> = predictions
            .into_iter()
            .enumerate()
            .map(|(i, p)| RankedGene {
                rank: i + 1,
                is_known_driver: drivers.contains(&p.gene),
                gene: p.gene,
                probability: p.probability,
                true_label: p.true_label,
            })
            .collect();

        let labels: Vec<u8> = match ranked.iter().map(|r| r.true_label).collect::<Option<Vec<_>>>() {
            Some(labels) if !labels.is_empty() => labels,
            _ => ranked.iter().map(|r| u8::from(r.is_known_driver)).collect(),
        };
        let scores: Vec<f64> = ranked.iter().map(|r| r.probability).collect();
        let auprc = metrics::average_precision(&labels, &scores);

        let total_known_drivers = ranked.iter().filter(|r| r.is_known_driver).count();
        let recovered_in_top_k = ranked
            .iter()
            .take(recovery_k)
            .filter(|r| r.is_known_driver)
            .count();

        Self {
            ranked,
            auprc,
            top_n,
            recovery_k,
            total_known_drivers,
            recovered_in_top_k,
        }
    }

    pub fn top(&self) -> &[RankedGene] {
        &self.ranked[..self.top_n.min(self.ranked.len())]
    }

    /// Render the report as markdown-flavoured text
    pub fn render(&self) -> String {
        let auprc = match self.auprc {
            Some(auprc) => format!("{:.4}", auprc),
            None => "undefined (no positive genes)".to_string(),
        };

        let mut lines = vec![
            "## Final Model Performance Summary".to_string(),
            format!("AUPRC on Test Set: {}", auprc),
            format!("Genes scored: {}", self.ranked.len()),
            String::new(),
            format!("## Top {} Predicted Cancer Driver Genes", self.top().len()),
            "-".repeat(50),
            "| Rank | Gene | Prediction_Prob | True_Label | Is_Known_Driver |".to_string(),
            "|:----|:-----|:----------------|:-----------|:----------------|".to_string(),
        ];
        lines.extend(self.top().iter().map(|row| {
            let label = row
                .true_label
                .map_or_else(|| "NA".to_string(), |l| l.to_string());
            format!(
                "| {} | {} | {:.5} | {} | {} |",
                row.rank, row.gene, row.probability, label, row.is_known_driver
            )
        }));
        lines.push(String::new());
        lines.push(format!(
            "Total Known Drivers in the Test Set: {}",
            self.total_known_drivers
        ));
        lines.push(format!(
            "Known Drivers correctly prioritized in the Top {}: {}",
            self.recovery_k, self.recovered_in_top_k
        ));

        lines.join("\n")
    }

    /// Write the rendered report to `path` and echo it to stdout
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let text = self.render();
        std::fs::write(path, &text)
            .with_context(|| format!("Failed to write report: {:?}", path))?;
        println!("\n{}", text);
        info!("Report saved to: {:?}", path);
        Ok(())
    }
}

/// Build the report for a predictions file and write it to `output`
pub fn generate_report(
    predictions_path: &Path,
    output: &Path,
    drivers: &HashSet<String>,
    top_n: usize,
    recovery_k: usize,
) -> Result<DriverReport> {
    let predictions = load_predictions(predictions_path)?;
    if predictions.is_empty() {
        warn!("No predictions in {:?}", predictions_path);
    }
    let report = DriverReport::build(predictions, drivers, top_n, recovery_k);
    report.write(output)?;
    Ok(report)
}
