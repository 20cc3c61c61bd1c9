//! Per-stage configuration derived from the run directory and settings

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::constants::*;
use super::PipelineSettings;
use crate::synthetic::ResamplingConfig;
use crate::training::SelectionMetric;

/// Identity and root directory of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPipelineConfig {
    pub pipeline_name: String,
    pub timestamp: String,
    /// `<artifact_dir>/<timestamp>`
    pub artifact_dir: PathBuf,
}

impl TrainingPipelineConfig {
    /// Create a run directory stamped with the current local time
    pub fn new(settings: &PipelineSettings) -> Self {
        Self::at(settings, Local::now())
    }

    /// Create a run directory stamped with an explicit time
    pub fn at(settings: &PipelineSettings, time: DateTime<Local>) -> Self {
        let timestamp = time.format(TIMESTAMP_FORMAT).to_string();
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            artifact_dir: settings.artifact_dir.join(&timestamp),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub data_ingestion_dir: PathBuf,
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub train_test_split_ratio: f64,
    pub database_name: String,
    pub collection_name: String,
    pub random_seed: u64,
}

impl DataIngestionConfig {
    pub fn new(pipeline: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let data_ingestion_dir = pipeline.artifact_dir.join(DATA_INGESTION_DIR_NAME);
        let ingested = data_ingestion_dir.join(DATA_INGESTION_INGESTED_DIR);
        Self {
            feature_store_file_path: data_ingestion_dir
                .join(DATA_INGESTION_FEATURE_STORE_DIR)
                .join(FILE_NAME),
            training_file_path: ingested.join(TRAIN_FILE_NAME),
            testing_file_path: ingested.join(TEST_FILE_NAME),
            data_ingestion_dir,
            train_test_split_ratio: settings.train_test_split_ratio,
            database_name: settings.database_name.clone(),
            collection_name: settings.collection_name.clone(),
            random_seed: settings.random_seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValidationConfig {
    pub data_validation_dir: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub drift_threshold: f64,
}

impl DataValidationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let data_validation_dir = pipeline.artifact_dir.join(DATA_VALIDATION_DIR_NAME);
        let valid = data_validation_dir.join(DATA_VALIDATION_VALID_DIR);
        let invalid = data_validation_dir.join(DATA_VALIDATION_INVALID_DIR);
        Self {
            valid_train_file_path: valid.join(TRAIN_FILE_NAME),
            valid_test_file_path: valid.join(TEST_FILE_NAME),
            invalid_train_file_path: invalid.join(TRAIN_FILE_NAME),
            invalid_test_file_path: invalid.join(TEST_FILE_NAME),
            drift_report_file_path: data_validation_dir
                .join(DATA_VALIDATION_DRIFT_REPORT_DIR)
                .join(DATA_VALIDATION_DRIFT_REPORT_FILE_NAME),
            data_validation_dir,
            drift_threshold: settings.drift_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    pub data_transformation_dir: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    /// Production copy of the fitted preprocessor
    pub final_preprocessor_file_path: PathBuf,
    pub resampling: ResamplingConfig,
    pub random_seed: u64,
}

impl DataTransformationConfig {
    pub fn new(pipeline: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let data_transformation_dir = pipeline.artifact_dir.join(DATA_TRANSFORMATION_DIR_NAME);
        let transformed = data_transformation_dir.join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR);
        Self {
            transformed_train_file_path: transformed.join(TRANSFORMED_TRAIN_FILE_NAME),
            transformed_test_file_path: transformed.join(TRANSFORMED_TEST_FILE_NAME),
            transformed_object_file_path: data_transformation_dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            data_transformation_dir,
            final_preprocessor_file_path: settings.final_preprocessor_path(),
            resampling: settings.resampling.clone(),
            random_seed: settings.random_seed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainerConfig {
    pub model_trainer_dir: PathBuf,
    pub trained_model_file_path: PathBuf,
    /// Production copy of the raw winning model
    pub final_model_file_path: PathBuf,
    pub selection_metric: SelectionMetric,
    pub cv_folds: usize,
    pub random_seed: u64,
    pub tracking_dir: PathBuf,
    pub experiment_name: String,
}

impl ModelTrainerConfig {
    pub fn new(pipeline: &TrainingPipelineConfig, settings: &PipelineSettings) -> Self {
        let model_trainer_dir = pipeline.artifact_dir.join(MODEL_TRAINER_DIR_NAME);
        Self {
            trained_model_file_path: model_trainer_dir
                .join(MODEL_TRAINER_TRAINED_MODEL_DIR)
                .join(MODEL_TRAINER_TRAINED_MODEL_NAME),
            model_trainer_dir,
            final_model_file_path: settings.final_model_path(),
            selection_metric: settings.selection_metric,
            cv_folds: settings.cv_folds,
            random_seed: settings.random_seed,
            tracking_dir: settings.tracking_dir.clone(),
            experiment_name: settings.experiment_name.clone(),
        }
    }
}
