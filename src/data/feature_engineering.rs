//! Per-gene feature derivation from mutation and structural-variant calls

use crate::config::PipelineConfig;
use crate::data::{GeneFeatures, MutationRecord, SvRecord, FEATURE_COLUMNS, GENE_COLUMN, LABEL_COLUMN};
use crate::utils::{self, stats};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Mutation statistics for one gene
#[derive(Debug, Clone, PartialEq)]
pub struct MutationAggregate {
    pub n_mut: usize,
    pub n_truncating: usize,
    pub median_depth: Option<f64>,
    pub median_alt_count: Option<f64>,
    pub position_variance: Option<f64>,
}

impl MutationAggregate {
    /// Fraction of mutations that are truncating
    pub fn fraction_truncating(&self) -> Option<f64> {
        (self.n_mut > 0).then(|| self.n_truncating as f64 / self.n_mut as f64)
    }

    /// Median alt count over median depth; missing for a zero or undefined depth
    pub fn median_vaf(&self) -> Option<f64> {
        match (self.median_alt_count, self.median_depth) {
            (Some(alt), Some(depth)) if depth != 0.0 => Some(alt / depth),
            _ => None,
        }
    }
}

/// Group mutations by gene and summarise each group
pub fn aggregate_mutations(records: &[MutationRecord]) -> BTreeMap<String, MutationAggregate> {
    let mut groups: BTreeMap<&str, Vec<&MutationRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.gene.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(gene, rows)| {
            let depths: Vec<f64> = rows.iter().filter_map(|r| r.depth).collect();
            let alts: Vec<f64> = rows.iter().filter_map(|r| r.alt_count).collect();
            let positions: Vec<f64> = rows.iter().filter_map(|r| r.position()).collect();

            let aggregate = MutationAggregate {
                n_mut: rows.len(),
                n_truncating: rows.iter().filter(|r| r.is_truncating()).count(),
                median_depth: stats::median(&depths),
                median_alt_count: stats::median(&alts),
                position_variance: stats::sample_variance(&positions),
            };
            (gene.to_string(), aggregate)
        })
        .collect()
}

/// Structural-variant statistics for one gene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvAggregate {
    pub n_sv: usize,
    pub n_inframe: usize,
    pub partners: BTreeSet<String>,
}

impl SvAggregate {
    /// In-frame fraction; missing when the gene has no SVs
    pub fn fraction_inframe(&self) -> Option<f64> {
        (self.n_sv > 0).then(|| self.n_inframe as f64 / self.n_sv as f64)
    }
}

/// Fold SV rows into per-gene aggregates
///
/// Every named site of a row counts as an occurrence, so a self-referential
/// row (same gene at both sites) counts twice but adds no partner edge.
/// In-frame events are credited to the site 2 gene only.
pub fn aggregate_structural_variants(records: &[SvRecord]) -> BTreeMap<String, SvAggregate> {
    records.iter().fold(BTreeMap::new(), |mut acc, sv| {
        let site1 = sv.site1_gene.as_deref();
        let site2 = sv.site2_gene.as_deref();

        for gene in site1.into_iter().chain(site2) {
            acc.entry(gene.to_string()).or_insert_with(SvAggregate::default).n_sv += 1;
        }

        if sv.is_in_frame() {
            if let Some(gene) = site2 {
                acc.entry(gene.to_string()).or_insert_with(SvAggregate::default).n_inframe += 1;
            }
        }

        if let (Some(a), Some(b)) = (site1, site2) {
            if a != b {
                acc.entry(a.to_string()).or_insert_with(SvAggregate::default).partners.insert(b.to_string());
                acc.entry(b.to_string()).or_insert_with(SvAggregate::default).partners.insert(a.to_string());
            }
        }

        acc
    })
}

/// Builds the per-gene feature matrix
pub struct FeatureBuilder {
    cds_lengths: HashMap<String, u64>,
    drivers: HashSet<String>,
}

impl FeatureBuilder {
    /// Create new feature builder
    pub fn new(cds_lengths: HashMap<String, u64>, drivers: HashSet<String>) -> Self {
        Self { cds_lengths, drivers }
    }

    /// Create from pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.gene_cds_lengths.clone(), config.driver_set())
    }

    /// Derive one feature row per gene, sorted by gene symbol
    pub fn build(&self, mutations: &[MutationRecord], svs: &[SvRecord]) -> Vec<GeneFeatures> {
        let mutation_stats = aggregate_mutations(mutations);
        let sv_stats = aggregate_structural_variants(svs);

        let universe: BTreeSet<&str> = mutation_stats
            .keys()
            .chain(sv_stats.keys())
            .map(String::as_str)
            .collect();
        info!(
            "Gene universe: {} genes ({} mutated, {} with SVs)",
            universe.len(),
            mutation_stats.len(),
            sv_stats.len()
        );

        let mut rows: Vec<GeneFeatures> = universe
            .into_iter()
            .map(|gene| {
                let mut features = GeneFeatures::new(gene);
                if let Some(m) = mutation_stats.get(gene) {
                    features.n_mut = Some(m.n_mut as f64);
                    features.n_truncating = Some(m.n_truncating as f64);
                    features.fraction_truncating = m.fraction_truncating();
                    features.median_vaf = m.median_vaf();
                    features.position_variance = m.position_variance;
                }
                features
            })
            .collect();

        self.normalise_length(&mut rows);

        for features in rows.iter_mut() {
            if let Some(sv) = sv_stats.get(&features.gene) {
                features.n_sv = Some(sv.n_sv as f64);
                features.n_inframe_sv = Some(sv.n_inframe as f64);
                features.fraction_inframe_sv = sv.fraction_inframe();
                features.n_partners = Some(sv.partners.len() as f64);
            }
        }

        for features in rows.iter_mut() {
            features.fill_missing();
            features.is_driver = self.drivers.contains(&features.gene);
        }

        let n_drivers = rows.iter().filter(|f| f.is_driver).count();
        info!("Labelled {} of {} genes as known drivers", n_drivers, rows.len());
        rows
    }

    /// Attach CDS lengths, compute mutations per kb and impute missing lengths
    ///
    /// Burden uses the raw length, so a gene without a length entry gets no
    /// burden (later filled with zero) but does get the cohort median length.
    fn normalise_length(&self, rows: &mut [GeneFeatures]) {
        for features in rows.iter_mut() {
            features.cds_length = self.cds_lengths.get(&features.gene).map(|&len| len as f64);
            features.mut_per_kb = match (features.n_mut, features.cds_length) {
                (Some(n), Some(len)) if len > 0.0 => Some(n / (len / 1000.0)),
                _ => None,
            };
        }

        let known: Vec<f64> = rows.iter().filter_map(|f| f.cds_length).collect();
        let median_length = stats::median(&known);
        debug!(
            "CDS length known for {} of {} genes, median {:?}",
            known.len(),
            rows.len(),
            median_length
        );

        for features in rows.iter_mut() {
            if features.cds_length.is_none() {
                features.cds_length = median_length;
            }
        }
    }
}

impl GeneFeatures {
    /// Resolve every missing feature to zero
    pub fn fill_missing(&mut self) {
        for slot in [
            &mut self.n_mut,
            &mut self.n_truncating,
            &mut self.fraction_truncating,
            &mut self.median_vaf,
            &mut self.position_variance,
            &mut self.cds_length,
            &mut self.mut_per_kb,
            &mut self.n_sv,
            &mut self.n_inframe_sv,
            &mut self.fraction_inframe_sv,
            &mut self.n_partners,
        ] {
            slot.get_or_insert(0.0);
        }
    }
}

/// Write the feature matrix as CSV, one row per gene
pub fn write_feature_matrix<P: AsRef<Path>>(rows: &[GeneFeatures], path: P) -> Result<()> {
    let path = path.as_ref();
    utils::ensure_parent_dir(path)?;

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    let mut header = vec![GENE_COLUMN];
    header.extend(FEATURE_COLUMNS);
    header.push(LABEL_COLUMN);
    writer.write_record(&header)?;

    for features in rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(features.gene.clone());
        record.extend(features.filled().iter().map(|v| v.to_string()));
        record.push(u8::from(features.is_driver).to_string());
        writer.write_record(&record)?;
    }

    writer.flush().context("Failed to flush feature matrix")?;
    info!("Saved feature matrix ({} genes) to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(gene: &str, classification: &str, position: &str, depth: f64, alt: f64) -> MutationRecord {
        MutationRecord {
            gene: gene.to_string(),
            classification: classification.to_string(),
            protein_position: position.to_string(),
            depth: Some(depth),
            alt_count: Some(alt),
        }
    }

    fn sv(site1: &str, site2: &str, frame: &str) -> SvRecord {
        let symbol = |s: &str| (!s.is_empty()).then(|| s.to_string());
        SvRecord {
            site1_gene: symbol(site1),
            site2_gene: symbol(site2),
            site2_frame: frame.to_string(),
        }
    }

    fn builder(lengths: &[(&str, u64)], drivers: &[&str]) -> FeatureBuilder {
        FeatureBuilder::new(
            lengths.iter().map(|(g, l)| (g.to_string(), *l)).collect(),
            drivers.iter().map(|g| g.to_string()).collect(),
        )
    }

    fn tp53_mutations() -> Vec<MutationRecord> {
        vec![
            mutation("TP53", "Nonsense_Mutation", "100", 100.0, 40.0),
            mutation("TP53", "Frame_Shift_Del", "110", 80.0, 20.0),
            mutation("TP53", "Splice_Site", "X", 120.0, 30.0),
            mutation("TP53", "Missense_Mutation", "175", 90.0, 30.0),
            mutation("TP53", "Missense_Mutation", "248", 60.0, 10.0),
        ]
    }

    #[test]
    fn test_aggregate_mutations() {
        let stats = aggregate_mutations(&tp53_mutations());
        let tp53 = &stats["TP53"];

        assert_eq!(tp53.n_mut, 5);
        assert_eq!(tp53.n_truncating, 3);
        assert_eq!(tp53.fraction_truncating(), Some(0.6));
        assert_eq!(tp53.median_depth, Some(90.0));
        assert_eq!(tp53.median_alt_count, Some(30.0));
        assert_eq!(tp53.median_vaf(), Some(30.0 / 90.0));
        // "X" is excluded, not coerced to zero
        let expected = stats::sample_variance(&[100.0, 110.0, 175.0, 248.0]);
        assert_eq!(tp53.position_variance, expected);
    }

    #[test]
    fn test_single_position_has_no_variance() {
        let stats = aggregate_mutations(&[mutation("KRAS", "Missense_Mutation", "12", 50.0, 10.0)]);
        assert_eq!(stats["KRAS"].position_variance, None);
    }

    #[test]
    fn test_zero_depth_vaf_is_missing() {
        let stats = aggregate_mutations(&[mutation("KRAS", "Missense_Mutation", "12", 0.0, 3.0)]);
        assert_eq!(stats["KRAS"].median_vaf(), None);
    }

    #[test]
    fn test_aggregate_structural_variants() {
        let svs = vec![
            sv("EML4", "ALK", "in-frame"),
            sv("NPM1", "ALK", "frameshift"),
            sv("EML4", "ALK", "in-frame"),
            sv("ALK", "", "in-frame"),
        ];
        let stats = aggregate_structural_variants(&svs);

        let alk = &stats["ALK"];
        assert_eq!(alk.n_sv, 4);
        assert_eq!(alk.n_inframe, 2);
        assert_eq!(alk.partners.len(), 2);
        assert_eq!(alk.fraction_inframe(), Some(0.5));

        let eml4 = &stats["EML4"];
        assert_eq!(eml4.n_sv, 2);
        assert_eq!(eml4.n_inframe, 0);
        assert_eq!(eml4.partners.len(), 1);
        assert_eq!(eml4.fraction_inframe(), Some(0.0));
    }

    #[test]
    fn test_self_referential_sv_has_no_partner() {
        let stats = aggregate_structural_variants(&[sv("MYC", "MYC", "in-frame")]);
        let myc = &stats["MYC"];
        assert_eq!(myc.n_sv, 2);
        assert_eq!(myc.n_inframe, 1);
        assert_eq!(myc.fraction_inframe(), Some(0.5));
        assert!(myc.partners.is_empty());
    }

    #[test]
    fn test_build_tp53_scenario() {
        let rows = builder(&[("TP53", 1182)], &["TP53"]).build(&tp53_mutations(), &[]);
        assert_eq!(rows.len(), 1);

        let tp53 = &rows[0];
        assert_eq!(tp53.n_mut, Some(5.0));
        assert_eq!(tp53.fraction_truncating, Some(0.6));
        assert_eq!(tp53.n_sv, Some(0.0));
        assert_eq!(tp53.fraction_inframe_sv, Some(0.0));
        assert_eq!(tp53.cds_length, Some(1182.0));
        assert_eq!(tp53.mut_per_kb, Some(5.0 / 1.182));
        assert!(tp53.is_driver);
    }

    #[test]
    fn test_build_sv_only_gene() {
        let rows = builder(&[("ALK", 4863)], &[]).build(
            &tp53_mutations(),
            &[sv("EML4", "ALK", "in-frame")],
        );
        let genes: Vec<&str> = rows.iter().map(|r| r.gene.as_str()).collect();
        assert_eq!(genes, vec!["ALK", "EML4", "TP53"]);

        let alk = &rows[0];
        assert_eq!(alk.n_mut, Some(0.0));
        assert_eq!(alk.mut_per_kb, Some(0.0));
        assert_eq!(alk.n_sv, Some(1.0));
        assert_eq!(alk.fraction_inframe_sv, Some(1.0));
        assert_eq!(alk.n_partners, Some(1.0));
        assert!(!alk.is_driver);
    }

    #[test]
    fn test_gene_universe_is_union_without_duplicates() {
        let mutations = vec![
            mutation("A", "Silent", "1", 10.0, 1.0),
            mutation("B", "Silent", "1", 10.0, 1.0),
            mutation("A", "Silent", "2", 10.0, 1.0),
        ];
        let svs = vec![sv("B", "C", "frameshift"), sv("D", "A", "in-frame")];
        let rows = builder(&[], &[]).build(&mutations, &svs);

        let genes: Vec<&str> = rows.iter().map(|r| r.gene.as_str()).collect();
        assert_eq!(genes, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_median_length_imputation() {
        let mutations = vec![
            mutation("A", "Silent", "1", 10.0, 1.0),
            mutation("B", "Silent", "1", 10.0, 1.0),
            mutation("C", "Silent", "1", 10.0, 1.0),
            mutation("D", "Silent", "1", 10.0, 1.0),
        ];
        let rows = builder(&[("A", 1000), ("B", 2000), ("C", 4000), ("ZZZ", 9000)], &[])
            .build(&mutations, &[]);

        let d = rows.iter().find(|r| r.gene == "D").unwrap();
        assert_eq!(d.cds_length, Some(2000.0));
        assert_eq!(d.mut_per_kb, Some(0.0));

        let a = rows.iter().find(|r| r.gene == "A").unwrap();
        assert_eq!(a.mut_per_kb, Some(1.0));
    }

    #[test]
    fn test_no_lengths_fill_zero() {
        let rows = builder(&[], &[]).build(&[mutation("A", "Silent", "1", 10.0, 1.0)], &[]);
        assert_eq!(rows[0].cds_length, Some(0.0));
        assert_eq!(rows[0].mut_per_kb, Some(0.0));
    }

    #[test]
    fn test_write_feature_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/features.csv");
        let rows = builder(&[("TP53", 1000)], &["TP53"]).build(&tp53_mutations(), &[]);

        write_feature_matrix(&rows, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Gene,N_mut,N_truncating,Fraction_Truncating,Median_VAF,Mutation_Position_Variance,\
CDS_Length,Mut_per_kb,N_SV,N_InFrame_SV,Fraction_InFrame_SV,N_Partners,Is_Driver"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("TP53,5,3,0.6,"));
        assert!(row.ends_with(",1000,5,0,0,0,0,1"));
        assert!(lines.next().is_none());
    }
}
