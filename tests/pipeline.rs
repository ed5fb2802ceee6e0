use approx::assert_relative_eq;
use drivergene::config::PipelineConfig;
use drivergene::data::feature_engineering::{write_feature_matrix, FeatureBuilder};
use drivergene::data::loader::{load_feature_matrix, load_mutations, load_structural_variants};
use drivergene::data::FEATURE_COLUMNS;
use drivergene::model::checkpoint::ModelSaver;
use drivergene::model::ModelConfig;
use drivergene::predict::load_predictions;
use drivergene::predict::predictor::Predictor;
use drivergene::report::generate_report;
use drivergene::training::trainer::train_model;
use drivergene::training::TrainingConfig;
use drivergene::PipelineError;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const N_DRIVERS: usize = 10;
const N_PASSENGERS: usize = 40;

fn driver(i: usize) -> String {
    format!("DRV{:02}", i)
}

fn passenger(i: usize) -> String {
    format!("PSG{:02}", i)
}

struct Cohort {
    dir: TempDir,
    config: PipelineConfig,
}

impl Cohort {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Drivers carry many high-VAF mutations spread along the protein and
/// in-frame fusions; passengers carry a single low-VAF mutation.
fn write_cohort() -> Cohort {
    let dir = TempDir::new().unwrap();

    let mut maf = String::from("#version 2.4\n");
    maf.push_str("Hugo_Symbol\tVariant_Classification\tProtein_position\tt_depth\tt_alt_count\n");
    for i in 0..N_DRIVERS {
        for m in 0..8 {
            let class = if m % 2 == 0 { "Nonsense_Mutation" } else { "Missense_Mutation" };
            let _ = writeln!(maf, "{}\t{}\t{}\t100\t40", driver(i), class, 50 + m * 40 + i);
        }
    }
    for i in 0..N_PASSENGERS {
        let _ = writeln!(maf, "{}\tSilent\t{}\t100\t5", passenger(i), 10 + i);
    }
    std::fs::write(dir.path().join("mutations.maf"), maf).unwrap();

    let mut sv = String::from("Site1_Hugo_Symbol\tSite2_Hugo_Symbol\tSite2_Effect_On_Frame\n");
    for i in 0..N_DRIVERS {
        let _ = writeln!(sv, "{}\t{}\tin-frame", passenger(i), driver(i));
    }
    let _ = writeln!(sv, "{}\t\tframeshift", passenger(N_PASSENGERS - 1));
    std::fs::write(dir.path().join("sv.tsv"), sv).unwrap();

    let mut yaml = String::from("GENE_CDS_LENGTHS:\n");
    let _ = writeln!(yaml, "  {}: 1200", driver(0));
    let _ = writeln!(yaml, "  {}: 3000", passenger(0));
    yaml.push_str("GOLD_STANDARD_DRIVERS:\n");
    for i in 0..N_DRIVERS {
        let _ = writeln!(yaml, "  - {}", driver(i));
    }
    yaml.push_str("TEST_SIZE: 0.2\nRANDOM_SEED: 42\nSMOTE_K_NEIGHBORS: 5\n");
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, yaml).unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    Cohort { dir, config }
}

fn build_features(cohort: &Cohort) -> PathBuf {
    let mutations = load_mutations(cohort.path("mutations.maf")).unwrap();
    let svs = load_structural_variants(cohort.path("sv.tsv")).unwrap();
    let rows = FeatureBuilder::from_config(&cohort.config).build(&mutations, &svs);

    let output = cohort.path("results/features.csv");
    write_feature_matrix(&rows, &output).unwrap();
    output
}

fn quick_config(cohort: &Cohort) -> TrainingConfig {
    TrainingConfig {
        model: ModelConfig::quick_test().with_seed(cohort.config.random_seed),
        ..TrainingConfig::from(&cohort.config)
    }
}

#[test]
fn test_feature_matrix_covers_gene_universe() {
    let cohort = write_cohort();
    let features = build_features(&cohort);

    let matrix = load_feature_matrix(&features, &FEATURE_COLUMNS, true).unwrap();
    assert_eq!(matrix.len(), N_DRIVERS + N_PASSENGERS);
    assert_eq!(matrix.positive_count(), N_DRIVERS);

    let unique: HashSet<&String> = matrix.genes.iter().collect();
    assert_eq!(unique.len(), matrix.len());

    let mut sorted = matrix.genes.clone();
    sorted.sort();
    assert_eq!(sorted, matrix.genes);

    let column = |name: &str| FEATURE_COLUMNS.iter().position(|&c| c == name).unwrap();
    let row = matrix.genes.iter().position(|g| g == &driver(0)).unwrap();
    let values = matrix.values.row(row);
    assert_eq!(values[column("N_mut")], 8.0);
    assert_eq!(values[column("N_truncating")], 4.0);
    assert_relative_eq!(values[column("Fraction_Truncating")], 0.5);
    assert_relative_eq!(values[column("Median_VAF")], 0.4);
    assert_eq!(values[column("CDS_Length")], 1200.0);
    assert_relative_eq!(values[column("Mut_per_kb")], 8.0 / 1.2);
    assert_eq!(values[column("N_SV")], 1.0);
    assert_eq!(values[column("Fraction_InFrame_SV")], 1.0);
    assert_eq!(values[column("N_Partners")], 1.0);

    // no fraction or variance is ever left undefined
    assert!(matrix.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_train_predict_report() {
    let cohort = write_cohort();
    let features = build_features(&cohort);
    let model_path = cohort.path("models/driver_model.bin");
    let test_predictions = cohort.path("results/test_predictions.csv");

    let result = train_model(&features, &model_path, &test_predictions, quick_config(&cohort)).unwrap();

    let metadata = &result.artifact.metadata;
    assert_eq!(metadata.test_counts.positive, 2);
    assert_eq!(metadata.test_counts.negative, 8);
    assert_eq!(metadata.resampled_counts.positive, metadata.resampled_counts.negative);
    assert_eq!(metadata.test_metrics.auprc, Some(1.0));
    assert!(model_path.exists());
    assert!(model_path.with_extension("json").exists());

    let held_out = load_predictions(&test_predictions).unwrap();
    assert_eq!(held_out.len(), 10);
    assert!(held_out.iter().all(|p| p.true_label.is_some()));

    let report_path = cohort.path("results/report.txt");
    let report = generate_report(
        &test_predictions,
        &report_path,
        &cohort.config.driver_set(),
        10,
        50,
    )
    .unwrap();
    assert_eq!(report.total_known_drivers, 2);
    assert_eq!(report.recovered_in_top_k, 2);
    assert!(report.ranked[..2].iter().all(|r| r.is_known_driver));
    let text = std::fs::read_to_string(&report_path).unwrap();
    assert!(text.contains("AUPRC on Test Set: 1.0000"));

    let predictor = Predictor::from_checkpoint(&model_path).unwrap();
    let scored_path = cohort.path("results/new_predictions.csv");
    let scored = predictor.predict_to_file(&features, &scored_path).unwrap();
    assert_eq!(scored.len(), N_DRIVERS + N_PASSENGERS);
    let top: HashSet<String> = scored[..N_DRIVERS].iter().map(|p| p.gene.clone()).collect();
    assert_eq!(top, (0..N_DRIVERS).map(driver).collect::<HashSet<_>>());
    assert!(scored.windows(2).all(|w| w[0].probability >= w[1].probability));

    let reloaded = load_predictions(&scored_path).unwrap();
    assert_eq!(reloaded, scored);
}

#[test]
fn test_training_is_deterministic() {
    let cohort = write_cohort();
    let features = build_features(&cohort);

    let run = |tag: &str| -> String {
        let model = cohort.path(&format!("{}/model.bin", tag));
        let predictions = cohort.path(&format!("{}/predictions.csv", tag));
        train_model(&features, &model, &predictions, quick_config(&cohort)).unwrap();
        std::fs::read_to_string(predictions).unwrap()
    };

    assert_eq!(run("first"), run("second"));
}

#[test]
fn test_predictor_rejects_missing_column() {
    let cohort = write_cohort();
    let features = build_features(&cohort);
    let model_path = cohort.path("model.bin");
    train_model(
        &features,
        &model_path,
        &cohort.path("predictions.csv"),
        quick_config(&cohort),
    )
    .unwrap();

    let incomplete = cohort.path("incomplete.csv");
    std::fs::write(
        &incomplete,
        "Gene,N_mut,Fraction_InFrame_SV,Mutation_Position_Variance\nTP53,5,0,100\n",
    )
    .unwrap();

    let output = cohort.path("scored.csv");
    let predictor = Predictor::new(ModelSaver::load(&model_path).unwrap());
    let err = predictor.predict_to_file(&incomplete, &output).unwrap_err();

    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::missing_column("feature matrix", "Median_VAF"))
    );
    assert!(!output.exists());
}

#[test]
fn test_missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing: &Path = &dir.path().join("absent.yaml");
    let err = PipelineConfig::load(missing).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingConfig { .. })
    ));
}
