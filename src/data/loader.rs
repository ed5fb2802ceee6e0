use crate::data::{
    mutation_columns, sv_columns, FeatureMatrix, MutationRecord, SvRecord, LABEL_COLUMN,
};
use crate::error::PipelineError;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Marker for comment lines in mutation tables
pub const COMMENT_MARKER: u8 = b'#';

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path, falling back to `default` when the
    /// extension does not name a delimiter (e.g. `.maf`)
    pub fn from_path<P: AsRef<Path>>(path: P, default: FileFormat) -> Self {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
        let stem = path.file_stem().and_then(|s| s.to_str()).map(str::to_lowercase);

        match (ext.as_deref(), stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    FileFormat::GzippedCsv
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") || stem.ends_with(".maf") {
                    FileFormat::GzippedTsv
                } else {
                    default.gzipped()
                }
            }
            (Some("csv"), _) => FileFormat::Csv,
            (Some("tsv"), _) | (Some("txt"), _) | (Some("maf"), _) => FileFormat::Tsv,
            _ => default,
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }

    fn gzipped(self) -> Self {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => FileFormat::GzippedCsv,
            FileFormat::Tsv | FileFormat::GzippedTsv => FileFormat::GzippedTsv,
        }
    }
}

/// Open a file, transparently decompressing gzip input
pub fn open_input<P: AsRef<Path>>(path: P, format: FileFormat) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    if format.is_gzipped() {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Header lookup for a delimited table
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    table: String,
    headers: Vec<String>,
}

impl ColumnIndex {
    pub fn new(table: impl Into<String>, headers: &StringRecord) -> Self {
        Self {
            table: table.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }

    /// Position of a column, if present
    pub fn find(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Position of a column that must be present
    pub fn require(&self, name: &str) -> Result<usize> {
        self.find(name)
            .ok_or_else(|| PipelineError::missing_column(&self.table, name).into())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn optional_symbol(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse a numeric cell leniently: blanks and non-numeric text are missing
fn optional_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Load the mutation table from file
pub fn load_mutations<P: AsRef<Path>>(path: P) -> Result<Vec<MutationRecord>> {
    let path = path.as_ref();
    info!("Loading mutations from {:?}", path);
    let format = FileFormat::from_path(path, FileFormat::Tsv);
    debug!("Detected file format: {:?}", format);
    let reader = open_input(path, format)?;
    parse_mutations(reader, format.delimiter())
        .with_context(|| format!("Failed to load mutation table {:?}", path))
}

/// Parse mutation records from reader
pub fn parse_mutations<R: Read>(reader: R, delimiter: u8) -> Result<Vec<MutationRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .comment(Some(COMMENT_MARKER))
        .trim(Trim::Headers)
        .from_reader(reader);

    let columns = ColumnIndex::new("mutation table", csv_reader.headers()?);
    let gene_idx = columns.require(mutation_columns::GENE)?;
    let class_idx = columns.require(mutation_columns::CLASSIFICATION)?;
    let position_idx = columns.require(mutation_columns::PROTEIN_POSITION)?;
    let depth_idx = columns.require(mutation_columns::DEPTH)?;
    let alt_idx = columns.require(mutation_columns::ALT_COUNT)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in csv_reader.records() {
        let record = result.context("Failed to parse mutation record")?;

        let Some(gene) = optional_symbol(cell(&record, gene_idx)) else {
            skipped += 1;
            continue;
        };

        records.push(MutationRecord {
            gene,
            classification: cell(&record, class_idx).trim().to_string(),
            protein_position: cell(&record, position_idx).to_string(),
            depth: optional_f64(cell(&record, depth_idx)),
            alt_count: optional_f64(cell(&record, alt_idx)),
        });
    }

    if skipped > 0 {
        warn!("Skipped {} mutation rows without a gene symbol", skipped);
    }
    info!("Loaded {} mutation records", records.len());
    Ok(records)
}

/// Load the structural-variant table from file
pub fn load_structural_variants<P: AsRef<Path>>(path: P) -> Result<Vec<SvRecord>> {
    let path = path.as_ref();
    info!("Loading structural variants from {:?}", path);
    let format = FileFormat::from_path(path, FileFormat::Tsv);
    debug!("Detected file format: {:?}", format);
    let reader = open_input(path, format)?;
    parse_structural_variants(reader, format.delimiter())
        .with_context(|| format!("Failed to load SV table {:?}", path))
}

/// Parse SV records from reader
pub fn parse_structural_variants<R: Read>(reader: R, delimiter: u8) -> Result<Vec<SvRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .from_reader(reader);

    let columns = ColumnIndex::new("SV table", csv_reader.headers()?);
    let site1_idx = columns.require(sv_columns::SITE1_GENE)?;
    let site2_idx = columns.require(sv_columns::SITE2_GENE)?;
    let frame_idx = columns.require(sv_columns::SITE2_FRAME)?;

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result.context("Failed to parse SV record")?;
        records.push(SvRecord {
            site1_gene: optional_symbol(cell(&record, site1_idx)),
            site2_gene: optional_symbol(cell(&record, site2_idx)),
            site2_frame: cell(&record, frame_idx).to_string(),
        });
    }

    info!("Loaded {} SV records", records.len());
    Ok(records)
}

/// Load selected columns of a feature matrix
///
/// The first column is the gene key whatever its header says. Only `columns`
/// (and the label, when `with_labels` is set) are parsed, so extra columns of
/// any type are tolerated.
pub fn load_feature_matrix<P: AsRef<Path>>(
    path: P,
    columns: &[&str],
    with_labels: bool,
) -> Result<FeatureMatrix> {
    let path = path.as_ref();
    info!("Loading feature matrix from {:?}", path);
    let format = FileFormat::from_path(path, FileFormat::Csv);
    let reader = open_input(path, format)?;
    parse_feature_matrix(reader, format.delimiter(), columns, with_labels)
        .with_context(|| format!("Failed to load feature matrix {:?}", path))
}

/// Parse selected feature-matrix columns from reader
pub fn parse_feature_matrix<R: Read>(
    reader: R,
    delimiter: u8,
    columns: &[&str],
    with_labels: bool,
) -> Result<FeatureMatrix> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .from_reader(reader);

    let index = ColumnIndex::new("feature matrix", csv_reader.headers()?);
    if index.is_empty() {
        return Err(PipelineError::missing_column("feature matrix", "gene key").into());
    }
    let feature_idx = columns
        .iter()
        .map(|name| index.require(name))
        .collect::<Result<Vec<_>>>()?;
    let label_idx = if with_labels {
        Some(index.require(LABEL_COLUMN)?)
    } else {
        None
    };

    let mut genes = Vec::new();
    let mut values = Vec::new();
    let mut labels = Vec::new();

    for result in csv_reader.records() {
        let record = result.context("Failed to parse feature matrix record")?;
        let line = line_of(&record);

        genes.push(cell(&record, 0).trim().to_string());

        for (&idx, &name) in feature_idx.iter().zip(columns) {
            let raw = cell(&record, idx);
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| PipelineError::InvalidValue {
                    column: name.to_string(),
                    value: raw.to_string(),
                    line,
                })?;
            values.push(value);
        }

        if let Some(idx) = label_idx {
            let raw = cell(&record, idx);
            let label = match raw.trim().parse::<f64>() {
                Ok(v) if v == 0.0 => 0u8,
                Ok(v) if v == 1.0 => 1u8,
                _ => {
                    return Err(PipelineError::InvalidValue {
                        column: LABEL_COLUMN.to_string(),
                        value: raw.to_string(),
                        line,
                    }
                    .into())
                }
            };
            labels.push(label);
        }
    }

    let values = Array2::from_shape_vec((genes.len(), columns.len()), values)
        .context("Feature values do not form a rectangular matrix")?;

    debug!("Feature matrix: {} genes x {} columns", genes.len(), columns.len());

    Ok(FeatureMatrix {
        genes,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values,
        labels: with_labels.then_some(labels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MODEL_FEATURES;
    use std::io::Cursor;

    const MAF: &str = "#version 2.4\n#comment line\n\
Hugo_Symbol\tVariant_Classification\tProtein_position\tt_depth\tt_alt_count\tExtra\n\
TP53\tNonsense_Mutation\t175\t100\t40\tx\n\
TP53\tMissense_Mutation\t175/393\tNA\t20\tx\n\
\tSilent\t1\t10\t1\tx\n";

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("data.csv", FileFormat::Tsv), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("data.tsv", FileFormat::Csv), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path("data.maf", FileFormat::Csv), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path("data.csv.gz", FileFormat::Tsv), FileFormat::GzippedCsv);
        assert_eq!(FileFormat::from_path("data.maf.gz", FileFormat::Csv), FileFormat::GzippedTsv);
        assert_eq!(FileFormat::from_path("data_sv", FileFormat::Tsv), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path("data.gz", FileFormat::Tsv), FileFormat::GzippedTsv);
    }

    #[test]
    fn test_parse_mutations_skips_comments_and_blank_genes() {
        let records = parse_mutations(Cursor::new(MAF), b'\t').unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].gene, "TP53");
        assert_eq!(records[0].depth, Some(100.0));
        assert_eq!(records[0].alt_count, Some(40.0));
        assert_eq!(records[1].depth, None);
        assert_eq!(records[1].position(), None);
    }

    #[test]
    fn test_parse_mutations_missing_column() {
        let data = "Hugo_Symbol\tVariant_Classification\tProtein_position\tt_depth\nTP53\tSilent\t1\t10\n";
        let err = parse_mutations(Cursor::new(data), b'\t').unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::missing_column("mutation table", "t_alt_count"))
        );
    }

    #[test]
    fn test_parse_structural_variants() {
        let data = "Site1_Hugo_Symbol\tSite2_Hugo_Symbol\tSite2_Effect_On_Frame\n\
EML4\tALK\tin-frame\n\
BCR\t\tframeshift\n";
        let records = parse_structural_variants(Cursor::new(data), b'\t').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].site2_gene.as_deref(), Some("ALK"));
        assert!(records[0].is_in_frame());
        assert_eq!(records[1].site2_gene, None);
    }

    #[test]
    fn test_parse_structural_variants_missing_frame() {
        let data = "Site1_Hugo_Symbol\tSite2_Hugo_Symbol\nEML4\tALK\n";
        let err = parse_structural_variants(Cursor::new(data), b'\t').unwrap_err();
        assert!(err.to_string().contains("Site2_Effect_On_Frame"));
    }

    #[test]
    fn test_parse_feature_matrix_selects_columns() {
        let data = ",Median_VAF,Note,N_mut,Fraction_InFrame_SV,Mutation_Position_Variance,Is_Driver\n\
TP53,0.4,hot,5,0,12.5,1\n\
GENE2,0.1,,1,0.5,0,0\n";
        let matrix = parse_feature_matrix(Cursor::new(data), b',', &MODEL_FEATURES, true).unwrap();

        assert_eq!(matrix.genes, vec!["TP53", "GENE2"]);
        assert_eq!(matrix.values.dim(), (2, 4));
        assert_eq!(matrix.values[[0, 0]], 5.0);
        assert_eq!(matrix.values[[0, 3]], 0.4);
        assert_eq!(matrix.values[[1, 1]], 0.5);
        assert_eq!(matrix.labels, Some(vec![1, 0]));
        assert_eq!(matrix.positive_count(), 1);
    }

    #[test]
    fn test_parse_feature_matrix_missing_feature() {
        let data = "Gene,N_mut,Fraction_InFrame_SV,Median_VAF\nTP53,5,0,0.4\n";
        let err = parse_feature_matrix(Cursor::new(data), b',', &MODEL_FEATURES, false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::missing_column("feature matrix", "Mutation_Position_Variance"))
        );
    }

    #[test]
    fn test_parse_feature_matrix_invalid_value() {
        let data = "Gene,N_mut,Fraction_InFrame_SV,Mutation_Position_Variance,Median_VAF\nTP53,five,0,0,0.4\n";
        let err = parse_feature_matrix(Cursor::new(data), b',', &MODEL_FEATURES, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidValue { column, .. }) if column == "N_mut"
        ));
    }
}
