use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::report::{DEFAULT_RECOVERY_K, DEFAULT_TOP_N};

/// drivergene: cancer driver gene prediction from mutation and SV calls
#[derive(Parser, Debug)]
#[command(name = "drivergene")]
#[command(about = "Predict cancer driver genes from somatic mutation and structural-variant calls")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to config/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the per-gene feature matrix
    Features(FeaturesArgs),

    /// Train the driver classifier
    Train(TrainArgs),

    /// Summarise ranked predictions
    Report(ReportArgs),

    /// Score a new feature matrix with a trained model
    Predict(PredictArgs),
}

/// Feature building arguments
#[derive(Parser, Debug)]
pub struct FeaturesArgs {
    /// Structural-variant table (tab-separated, optionally gzipped)
    pub sv: PathBuf,

    /// Mutation table in MAF layout (tab-separated, optionally gzipped)
    pub mutations: PathBuf,

    /// Output feature matrix (CSV)
    pub output: PathBuf,
}

/// Training arguments
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Feature matrix produced by `features`
    pub feature_matrix: PathBuf,

    /// Output model file
    pub model_out: PathBuf,

    /// Output file for held-out predictions
    pub predictions_out: PathBuf,

    /// Show a progress bar while fitting
    #[arg(long)]
    pub progress: bool,

    /// Quick test mode (fewer trees)
    #[arg(long)]
    pub quick: bool,
}

/// Report arguments
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Predictions file (Gene, Prediction_Prob, optional True_Label)
    pub predictions: PathBuf,

    /// Output report file
    pub output: PathBuf,

    /// Rows in the ranked table
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// Rank cutoff for counting recovered drivers
    #[arg(long, default_value_t = DEFAULT_RECOVERY_K)]
    pub recovery_k: usize,
}

/// Prediction arguments
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Feature matrix to score (any superset of the model columns)
    pub feature_matrix: PathBuf,

    /// Model file written by `train`
    pub model: PathBuf,

    /// Output file for predictions
    pub output: PathBuf,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
///
/// `RUST_LOG` takes precedence over the verbosity flag when set.
pub fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
