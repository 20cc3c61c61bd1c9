//! Data validation stage
//!
//! Checks both splits against the schema and measures drift between them.

use ndarray::Array1;
use polars::prelude::*;
use tracing::{info, warn};

use crate::artifact::{DataIngestionArtifact, DataValidationArtifact};
use crate::config::DataValidationConfig;
use crate::drift::{ColumnDrift, DriftDetector, DriftReport, KolmogorovSmirnovTest};
use crate::error::Result;
use crate::schema::SchemaConfig;
use crate::utils::{numeric_column, string_column, write_yaml_file, DataLoader, DataSaver};

/// Outcome of the column presence check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPresence {
    pub missing_numerical: Vec<String>,
    pub missing_categorical: Vec<String>,
}

impl ColumnPresence {
    pub fn is_complete(&self) -> bool {
        self.missing_numerical.is_empty() && self.missing_categorical.is_empty()
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.missing_numerical
            .iter()
            .chain(&self.missing_categorical)
            .map(String::as_str)
    }
}

pub struct DataValidation {
    ingestion_artifact: DataIngestionArtifact,
    config: DataValidationConfig,
    schema: SchemaConfig,
}

impl DataValidation {
    pub fn new(
        ingestion_artifact: DataIngestionArtifact,
        config: DataValidationConfig,
        schema: SchemaConfig,
    ) -> Self {
        Self {
            ingestion_artifact,
            config,
            schema,
        }
    }

    /// True iff the frame has exactly as many columns as the schema declares
    pub fn validate_number_of_columns(&self, df: &DataFrame) -> bool {
        let expected = self.schema.column_count();
        info!(required = expected, actual = df.width(), "Checked number of columns");
        df.width() == expected
    }

    /// Every numerical and categorical schema column must be present
    pub fn is_columns_exist(&self, df: &DataFrame) -> ColumnPresence {
        let present = df.get_column_names_str();
        let missing = |columns: &[String]| -> Vec<String> {
            columns
                .iter()
                .filter(|c| !present.contains(&c.as_str()))
                .cloned()
                .collect()
        };

        let presence = ColumnPresence {
            missing_numerical: missing(&self.schema.numerical_columns),
            missing_categorical: missing(&self.schema.categorical_columns),
        };
        if !presence.missing_numerical.is_empty() {
            info!(columns = ?presence.missing_numerical, "Missing numerical columns");
        }
        if !presence.missing_categorical.is_empty() {
            info!(columns = ?presence.missing_categorical, "Missing categorical columns");
        }
        presence
    }

    /// Run the KS test on every shared column and write the YAML report
    pub fn detect_dataset_drift(&self, base: &DataFrame, current: &DataFrame) -> Result<DriftReport> {
        let report = drift_report(base, current, self.config.drift_threshold)?;
        write_yaml_file(&self.config.drift_report_file_path, &report, true)?;
        info!(
            path = %self.config.drift_report_file_path.display(),
            drifted = ?report.drifted_columns(),
            "Wrote drift report"
        );
        Ok(report)
    }

    pub fn initiate_data_validation(&self) -> Result<DataValidationArtifact> {
        info!("Starting data validation");
        let loader = DataLoader::new();
        let mut train = loader.load_csv(&self.ingestion_artifact.trained_file_path)?;
        let mut test = loader.load_csv(&self.ingestion_artifact.test_file_path)?;

        let mut messages = Vec::new();
        for (label, df) in [("Train", &train), ("Test", &test)] {
            if !self.validate_number_of_columns(df) {
                messages.push(format!(
                    "{} dataframe does not contain all columns: expected {} columns, found {}",
                    label,
                    self.schema.column_count(),
                    df.width()
                ));
            }
        }
        for (label, df) in [("train", &train), ("test", &test)] {
            let presence = self.is_columns_exist(df);
            if !presence.is_complete() {
                messages.push(format!(
                    "Columns are missing in {} dataframe: {}",
                    label,
                    presence.missing().collect::<Vec<_>>().join(", ")
                ));
            }
        }
        for message in &messages {
            warn!(%message, "Validation finding");
        }

        let report = self.detect_dataset_drift(&train, &test)?;
        let validation_status = report.is_drift_free();

        DataSaver::save_csv(&mut train, &self.config.valid_train_file_path)?;
        DataSaver::save_csv(&mut test, &self.config.valid_test_file_path)?;
        info!(validation_status, findings = messages.len(), "Finished data validation");

        Ok(DataValidationArtifact {
            validation_status,
            valid_train_file_path: self.config.valid_train_file_path.clone(),
            valid_test_file_path: self.config.valid_test_file_path.clone(),
            invalid_train_file_path: self.config.invalid_train_file_path.clone(),
            invalid_test_file_path: self.config.invalid_test_file_path.clone(),
            drift_report_file_path: self.config.drift_report_file_path.clone(),
            messages,
        })
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Non-null values of a shared column from both tables as comparable numbers
///
/// Text columns are mapped to their rank in the sorted union of both sides.
fn comparable_samples(base: &DataFrame, current: &DataFrame, name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let base_dtype = base.column(name)?.dtype().clone();
    let current_dtype = current.column(name)?.dtype().clone();

    if is_numeric(&base_dtype) && is_numeric(&current_dtype) {
        let keep = |v: Vec<f64>| v.into_iter().filter(|x| !x.is_nan()).collect::<Vec<_>>();
        return Ok((keep(numeric_column(base, name)?), keep(numeric_column(current, name)?)));
    }

    let a: Vec<String> = string_column(base, name)?.into_iter().flatten().collect();
    let b: Vec<String> = string_column(current, name)?.into_iter().flatten().collect();
    let mut categories: Vec<&String> = a.iter().chain(&b).collect();
    categories.sort();
    categories.dedup();
    let rank = |s: &String| categories.binary_search(&s).unwrap_or_default() as f64;
    Ok((a.iter().map(rank).collect(), b.iter().map(rank).collect()))
}

/// Per-column two-sample KS test over the columns both tables share
pub fn drift_report(base: &DataFrame, current: &DataFrame, threshold: f64) -> Result<DriftReport> {
    let detector = KolmogorovSmirnovTest::new(threshold);
    let current_columns = current.get_column_names_str();
    let mut report = DriftReport::new();

    for name in base.get_column_names_str() {
        if !current_columns.contains(&name) {
            continue;
        }
        let (a, b) = comparable_samples(base, current, name)?;
        if a.is_empty() || b.is_empty() {
            warn!(column = name, "Skipping drift test on column without values");
            continue;
        }
        let result = detector.detect(&Array1::from(a), &Array1::from(b))?;
        report.insert(
            name,
            ColumnDrift {
                p_value: result.p_value,
                drift_status: result.drift_detected,
            },
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::machine_schema;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn validation(dir: &TempDir) -> DataValidation {
        let root = dir.path();
        let config = DataValidationConfig {
            data_validation_dir: root.to_path_buf(),
            valid_train_file_path: root.join("valid/train.csv"),
            valid_test_file_path: root.join("valid/test.csv"),
            invalid_train_file_path: root.join("invalid/train.csv"),
            invalid_test_file_path: root.join("invalid/test.csv"),
            drift_report_file_path: root.join("drift/report.yaml"),
            drift_threshold: 0.05,
        };
        let artifact = DataIngestionArtifact {
            trained_file_path: PathBuf::from("unused"),
            test_file_path: PathBuf::from("unused"),
        };
        DataValidation::new(artifact, config, machine_schema())
    }

    #[test]
    fn test_number_of_columns() {
        let dir = TempDir::new().unwrap();
        let v = validation(&dir);

        let names: Vec<String> = (0..10).map(|i| format!("c{}", i)).collect();
        let full = DataFrame::new(
            names.iter().map(|n| Column::new(n.as_str().into(), &[1i64])).collect(),
        )
        .unwrap();
        assert!(v.validate_number_of_columns(&full));

        let short = full.drop("c9").unwrap();
        assert!(!v.validate_number_of_columns(&short));
        assert!(!v.validate_number_of_columns(&DataFrame::empty()));
    }

    #[test]
    fn test_missing_columns_reported() {
        let dir = TempDir::new().unwrap();
        let v = validation(&dir);
        let df = df! {
            "UDI" => &[1i64],
            "Type" => &["M"],
        }
        .unwrap();

        let presence = v.is_columns_exist(&df);
        assert!(!presence.is_complete());
        assert!(presence.missing_numerical.contains(&"Torque [Nm]".to_string()));
        assert!(presence.missing_categorical.contains(&"Product ID".to_string()));
        assert!(!presence.missing_categorical.contains(&"Type".to_string()));
    }

    #[test]
    fn test_identical_tables_have_no_drift() {
        let df = df! {
            "Torque [Nm]" => &[40.1f64, 42.0, 39.5, 45.2, 41.7],
            "Type" => &["L", "M", "L", "H", "M"],
        }
        .unwrap();
        let report = drift_report(&df, &df, 0.05).unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.is_drift_free());
        assert_eq!(report.get("Type").unwrap().p_value, 1.0);
        assert_eq!(report.get("Torque [Nm]").unwrap().p_value, 1.0);
    }

    #[test]
    fn test_shifted_column_drifts() {
        let base: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let shifted: Vec<f64> = (0..200).map(|i| i as f64 + 500.0).collect();
        let a = df! { "x" => base }.unwrap();
        let b = df! { "x" => shifted }.unwrap();

        let report = drift_report(&a, &b, 0.05).unwrap();
        assert!(!report.is_drift_free());
        assert!(report.get("x").unwrap().drift_status);
    }

    #[test]
    fn test_drift_report_written() {
        let dir = TempDir::new().unwrap();
        let v = validation(&dir);
        let df = df! { "Tool wear [min]" => &[1i64, 5, 9, 12] }.unwrap();

        v.detect_dataset_drift(&df, &df).unwrap();
        let yaml = std::fs::read_to_string(dir.path().join("drift/report.yaml")).unwrap();
        assert!(yaml.contains("Tool wear [min]"));
        assert!(yaml.contains("drift_status: false"));
    }
}
