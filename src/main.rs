use anyhow::{Context, Result};
use drivergene::cli::{parse_args, setup_logging, Commands, FeaturesArgs, PredictArgs, ReportArgs, TrainArgs};
use drivergene::config::{resolve_path, PipelineConfig};
use drivergene::data::feature_engineering::{write_feature_matrix, FeatureBuilder};
use drivergene::data::loader::{load_mutations, load_structural_variants};
use drivergene::model::ModelConfig;
use drivergene::predict::predictor::Predictor;
use drivergene::predict::print_top_candidates;
use drivergene::report::generate_report;
use drivergene::training::{trainer::train_model, TrainingConfig};
use std::path::Path;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", drivergene::info());

    let config_path = resolve_path(cli.config.as_deref());
    let result = match cli.command {
        Commands::Features(args) => run_features(args, &config_path),
        Commands::Train(args) => run_train(args, &config_path),
        Commands::Report(args) => run_report(args, &config_path),
        Commands::Predict(args) => run_predict(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_features(args: FeaturesArgs, config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;

    info!("Building features...");
    info!("SV table: {:?}", args.sv);
    info!("Mutation table: {:?}", args.mutations);

    let mutations = load_mutations(&args.mutations)?;
    let svs = load_structural_variants(&args.sv)?;

    let rows = FeatureBuilder::from_config(&config).build(&mutations, &svs);
    write_feature_matrix(&rows, &args.output)?;

    let drivers = rows.iter().filter(|r| r.is_driver).count();
    info!(
        "Feature matrix saved to: {:?} ({} genes, {} known drivers)",
        args.output,
        rows.len(),
        drivers
    );
    Ok(())
}

fn run_train(args: TrainArgs, config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;

    info!("Starting training...");
    info!("Feature matrix: {:?}", args.feature_matrix);

    let mut training_config = TrainingConfig::from(&config);
    training_config.show_progress = args.progress;
    if args.quick {
        training_config.model = ModelConfig::quick_test().with_seed(config.random_seed);
    }

    let result = train_model(
        &args.feature_matrix,
        &args.model_out,
        &args.predictions_out,
        training_config,
    )?;

    let metrics = &result.artifact.metadata.test_metrics;
    info!("=== Training Results ===");
    info!("Training time: {:.2}s", result.duration_secs);
    match metrics.auprc {
        Some(auprc) => info!("Test AUPRC: {:.4}", auprc),
        None => info!("Test AUPRC: undefined"),
    }
    info!("Model saved to: {:?}", args.model_out);
    info!("Test predictions saved to: {:?}", args.predictions_out);
    Ok(())
}

fn run_report(args: ReportArgs, config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;

    info!("Generating report from {:?}", args.predictions);
    generate_report(
        &args.predictions,
        &args.output,
        &config.driver_set(),
        args.top_n,
        args.recovery_k,
    )?;
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    info!("Starting prediction...");
    info!("Input file: {:?}", args.feature_matrix);
    info!("Model: {:?}", args.model);

    let predictor = Predictor::from_checkpoint(&args.model)
        .with_context(|| format!("Failed to load model from {:?}", args.model))?;

    let predictions = predictor.predict_to_file(&args.feature_matrix, &args.output)?;
    print_top_candidates(&predictions, 10);

    info!("Predictions saved to: {:?}", args.output);
    Ok(())
}
