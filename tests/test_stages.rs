mod common;

use predictive_maintenance::artifact::DataIngestionArtifact;
use predictive_maintenance::pipeline::TrainingPipeline;
use predictive_maintenance::schema::SchemaConfig;
use predictive_maintenance::transformation::split_label;
use predictive_maintenance::utils::{load_array, DataSaver};
use predictive_maintenance::validation::drift_report;
use tempfile::TempDir;

use common::{machine_readings, schema_path, seeded_settings};

#[test]
fn test_independent_samples_mostly_agree() {
    let base = machine_readings(300, 1);
    let current = machine_readings(300, 2);

    let report = drift_report(&base, &current, 0.05).unwrap();
    assert_eq!(report.len(), base.width());
    assert!(report.drifted_columns().len() * 2 < report.len());
}

#[test]
fn test_validation_reports_column_shortfall() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 10);
    let pipeline = TrainingPipeline::new(settings);
    let schema = SchemaConfig::from_yaml_file(schema_path()).unwrap();

    let train_path = dir.path().join("raw/train.csv");
    let test_path = dir.path().join("raw/test.csv");
    let mut train = machine_readings(80, 1).drop("Failure Type").unwrap();
    let mut test = machine_readings(20, 2).drop("Failure Type").unwrap();
    DataSaver::save_csv(&mut train, &train_path).unwrap();
    DataSaver::save_csv(&mut test, &test_path).unwrap();

    let artifact = pipeline
        .start_data_validation(
            DataIngestionArtifact {
                trained_file_path: train_path,
                test_file_path: test_path,
            },
            &schema,
        )
        .unwrap();

    assert!(artifact
        .messages
        .iter()
        .any(|m| m.contains("expected 10 columns, found 9")));
    assert!(artifact
        .messages
        .iter()
        .any(|m| m.contains("Failure Type")));
    assert!(artifact.valid_train_file_path.is_file());
    assert!(artifact.valid_test_file_path.is_file());
    assert!(artifact.drift_report_file_path.is_file());
}

#[test]
fn test_transformation_outputs_label_last() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 300);
    let pipeline = TrainingPipeline::new(settings.clone());
    let schema = SchemaConfig::from_yaml_file(schema_path()).unwrap();

    let ingestion = pipeline.start_data_ingestion().unwrap();
    let validation = pipeline.start_data_validation(ingestion, &schema).unwrap();
    let transformation = pipeline.start_data_transformation(validation, &schema).unwrap();

    let width = schema.feature_width() + 1;
    for path in [
        &transformation.transformed_train_file_path,
        &transformation.transformed_test_file_path,
    ] {
        let arr = load_array(path).unwrap();
        assert_eq!(arr.ncols(), width);

        let (x, y) = split_label(&arr).unwrap();
        assert!(y.iter().any(|&label| label == 0));
        assert!(y.iter().any(|&label| label == 1));
        // Ordinal codes of L, M, H; synthetic rows fall between them
        assert!(x.column(0).iter().all(|&code| (0.0..=2.0).contains(&code)));
    }

    assert!(transformation.transformed_object_file_path.is_file());
    assert!(settings.final_preprocessor_path().is_file());
}
