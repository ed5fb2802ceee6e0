pub mod feature_engineering;
pub mod loader;
pub mod preprocessing;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Variant classifications counted as truncating
pub const TRUNCATING_CLASSES: &[&str] = &[
    "Frame_Shift_Ins",
    "Frame_Shift_Del",
    "Nonsense_Mutation",
    "Splice_Site",
];

/// Frame-effect value marking an in-frame SV breakpoint
pub const IN_FRAME: &str = "in-frame";

/// Mutation table columns
pub mod mutation_columns {
    pub const GENE: &str = "Hugo_Symbol";
    pub const CLASSIFICATION: &str = "Variant_Classification";
    pub const PROTEIN_POSITION: &str = "Protein_position";
    pub const DEPTH: &str = "t_depth";
    pub const ALT_COUNT: &str = "t_alt_count";
}

/// SV table columns
pub mod sv_columns {
    pub const SITE1_GENE: &str = "Site1_Hugo_Symbol";
    pub const SITE2_GENE: &str = "Site2_Hugo_Symbol";
    pub const SITE2_FRAME: &str = "Site2_Effect_On_Frame";
}

/// Feature matrix column holding the row key
pub const GENE_COLUMN: &str = "Gene";

/// Feature matrix column holding the driver label
pub const LABEL_COLUMN: &str = "Is_Driver";

/// Derived feature columns, in output order
pub const FEATURE_COLUMNS: [&str; 11] = [
    "N_mut",
    "N_truncating",
    "Fraction_Truncating",
    "Median_VAF",
    "Mutation_Position_Variance",
    "CDS_Length",
    "Mut_per_kb",
    "N_SV",
    "N_InFrame_SV",
    "Fraction_InFrame_SV",
    "N_Partners",
];

/// Features the classifier is trained on, in model input order
pub const MODEL_FEATURES: [&str; 4] = [
    "N_mut",
    "Fraction_InFrame_SV",
    "Mutation_Position_Variance",
    "Median_VAF",
];

/// One somatic mutation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Gene symbol
    pub gene: String,
    /// Variant classification
    pub classification: String,
    /// Protein position as written in the input
    pub protein_position: String,
    /// Tumor read depth
    pub depth: Option<f64>,
    /// Tumor alternate-allele read count
    pub alt_count: Option<f64>,
}

impl MutationRecord {
    /// Whether the classification belongs to the truncating set
    pub fn is_truncating(&self) -> bool {
        TRUNCATING_CLASSES.contains(&self.classification.as_str())
    }

    /// Numeric protein position; non-numeric text yields `None`
    pub fn position(&self) -> Option<f64> {
        self.protein_position
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// One structural-variant breakpoint pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvRecord {
    /// Site 1 partner gene
    pub site1_gene: Option<String>,
    /// Site 2 partner gene
    pub site2_gene: Option<String>,
    /// Frame effect at site 2
    pub site2_frame: String,
}

impl SvRecord {
    /// Whether the site 2 breakpoint preserves the reading frame
    pub fn is_in_frame(&self) -> bool {
        self.site2_frame.trim().eq_ignore_ascii_case(IN_FRAME)
    }
}

/// Per-gene feature vector
///
/// `None` marks a value that is undefined for the gene; [`GeneFeatures::filled`]
/// resolves every remaining `None` to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneFeatures {
    pub gene: String,
    pub n_mut: Option<f64>,
    pub n_truncating: Option<f64>,
    pub fraction_truncating: Option<f64>,
    pub median_vaf: Option<f64>,
    pub position_variance: Option<f64>,
    pub cds_length: Option<f64>,
    pub mut_per_kb: Option<f64>,
    pub n_sv: Option<f64>,
    pub n_inframe_sv: Option<f64>,
    pub fraction_inframe_sv: Option<f64>,
    pub n_partners: Option<f64>,
    /// Gold-standard driver membership
    pub is_driver: bool,
}

impl GeneFeatures {
    /// Create an empty feature vector for a gene
    pub fn new(gene: impl Into<String>) -> Self {
        Self {
            gene: gene.into(),
            ..Self::default()
        }
    }

    /// Feature values in [`FEATURE_COLUMNS`] order
    pub fn values(&self) -> [Option<f64>; FEATURE_COLUMNS.len()] {
        [
            self.n_mut,
            self.n_truncating,
            self.fraction_truncating,
            self.median_vaf,
            self.position_variance,
            self.cds_length,
            self.mut_per_kb,
            self.n_sv,
            self.n_inframe_sv,
            self.fraction_inframe_sv,
            self.n_partners,
        ]
    }

    /// Feature values with missing entries set to zero
    pub fn filled(&self) -> [f64; FEATURE_COLUMNS.len()] {
        self.values().map(|v| v.unwrap_or(0.0))
    }

    /// Value of a named feature column
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|&c| c == column)
            .and_then(|idx| self.values()[idx])
    }
}

/// Numeric feature table keyed by gene, as read back from disk
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Row keys
    pub genes: Vec<String>,
    /// Column names of `values`
    pub columns: Vec<String>,
    /// Feature values (genes x columns)
    pub values: Array2<f64>,
    /// Driver labels, when the table carries them
    pub labels: Option<Vec<u8>>,
}

impl FeatureMatrix {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Number of positive labels
    pub fn positive_count(&self) -> usize {
        self.labels
            .as_ref()
            .map(|labels| labels.iter().filter(|&&y| y == 1).count())
            .unwrap_or(0)
    }
}

/// Labelled rows with features restricted to the model inputs
#[derive(Debug, Clone)]
pub struct LabeledSet {
    pub genes: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Vec<u8>,
}

impl LabeledSet {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set has no rows
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Count of (negative, positive) labels
    pub fn class_counts(&self) -> (usize, usize) {
        let pos = self.labels.iter().filter(|&&y| y == 1).count();
        (self.labels.len() - pos, pos)
    }
}

/// Train/test partition of a labelled set
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Training rows (possibly oversampled)
    pub train: LabeledSet,
    /// Held-out rows, never resampled
    pub test: LabeledSet,
}

impl Dataset {
    /// Get total number of rows
    pub fn total_samples(&self) -> usize {
        self.train.len() + self.test.len()
    }
}
