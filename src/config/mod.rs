//! Pipeline configuration
//!
//! [`PipelineSettings`] is loaded once by the binary and handed to every
//! stage. The per-stage configs in [`entity`] are derived from it together
//! with the timestamped [`TrainingPipelineConfig`] of the current run.

pub mod constants;
mod entity;

pub use entity::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelTrainerConfig,
    TrainingPipelineConfig,
};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::synthetic::ResamplingConfig;
use crate::training::SelectionMetric;

/// Settings for a whole training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Root under which each run gets a timestamped directory
    pub artifact_dir: PathBuf,

    /// Path of the YAML schema document
    pub schema_path: PathBuf,

    /// Root directory of the document store
    pub document_store_root: PathBuf,

    /// Database holding the raw telemetry
    pub database_name: String,

    /// Collection holding the raw telemetry
    pub collection_name: String,

    /// Fraction of rows held out for testing
    pub train_test_split_ratio: f64,

    /// Seed for every random step of a run
    pub random_seed: u64,

    /// P-value below which a column counts as drifted
    pub drift_threshold: f64,

    /// Rebalancing parameters
    pub resampling: ResamplingConfig,

    /// Metric used to rank model families on held-out data
    pub selection_metric: SelectionMetric,

    /// Folds used by the grid search
    pub cv_folds: usize,

    /// Root directory of the local experiment tracker
    pub tracking_dir: PathBuf,

    /// Experiment name runs are logged under
    pub experiment_name: String,

    /// Directory the inference service loads its objects from
    pub final_model_dir: PathBuf,

    /// Directory predictions are written to
    pub prediction_output_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(constants::ARTIFACT_DIR),
            schema_path: PathBuf::from(constants::SCHEMA_FILE_PATH),
            document_store_root: PathBuf::from(constants::DOCUMENT_STORE_DIR),
            database_name: constants::DATA_INGESTION_DATABASE_NAME.to_string(),
            collection_name: constants::DATA_INGESTION_COLLECTION_NAME.to_string(),
            train_test_split_ratio: constants::DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO,
            random_seed: 42,
            drift_threshold: constants::DATA_VALIDATION_DRIFT_THRESHOLD,
            resampling: ResamplingConfig::default(),
            selection_metric: SelectionMetric::default(),
            cv_folds: constants::MODEL_TRAINER_CV_FOLDS,
            tracking_dir: PathBuf::from(constants::TRACKING_DIR),
            experiment_name: constants::PIPELINE_NAME.to_string(),
            final_model_dir: PathBuf::from(constants::FINAL_MODEL_DIR),
            prediction_output_dir: PathBuf::from(constants::PREDICTION_OUTPUT_DIR),
        }
    }
}

impl PipelineSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a YAML file; missing keys fall back to defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MaintenanceError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Self = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.train_test_split_ratio > 0.0 && self.train_test_split_ratio < 1.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "train_test_split_ratio".to_string(),
                value: self.train_test_split_ratio.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if !(self.drift_threshold > 0.0 && self.drift_threshold < 1.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "drift_threshold".to_string(),
                value: self.drift_threshold.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.cv_folds < 2 {
            return Err(MaintenanceError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.cv_folds.to_string(),
                reason: "at least 2 folds are required".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    pub fn with_document_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_store_root = root.into();
        self
    }

    pub fn with_collection(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.database_name = database.into();
        self.collection_name = collection.into();
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_selection_metric(mut self, metric: SelectionMetric) -> Self {
        self.selection_metric = metric;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = dir.into();
        self
    }

    pub fn with_final_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.final_model_dir = dir.into();
        self
    }

    pub fn with_prediction_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prediction_output_dir = dir.into();
        self
    }

    /// Place every output directory under `root`
    pub fn rooted_at(self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.with_artifact_dir(root.join(constants::ARTIFACT_DIR))
            .with_tracking_dir(root.join(constants::TRACKING_DIR))
            .with_final_model_dir(root.join(constants::FINAL_MODEL_DIR))
            .with_prediction_output_dir(root.join(constants::PREDICTION_OUTPUT_DIR))
    }

    /// Path of the preprocessor the inference service loads
    pub fn final_preprocessor_path(&self) -> PathBuf {
        self.final_model_dir.join(constants::FINAL_PREPROCESSOR_FILE_NAME)
    }

    /// Path of the model the inference service loads
    pub fn final_model_path(&self) -> PathBuf {
        self.final_model_dir.join(constants::FINAL_MODEL_FILE_NAME)
    }
}
