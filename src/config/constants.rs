//! Fixed names and defaults shared by the training pipeline and the inference service

pub const PIPELINE_NAME: &str = "MachinePredictiveMaintenance";
pub const ARTIFACT_DIR: &str = "Artifacts";
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const FILE_NAME: &str = "predictive_maintenance.csv";
pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const SCHEMA_FILE_PATH: &str = "data_schema/schema.yaml";

pub const DOCUMENT_STORE_DIR: &str = "document_store";
pub const DATA_INGESTION_DATABASE_NAME: &str = "Predictive_Maintenance_MLOps";
pub const DATA_INGESTION_COLLECTION_NAME: &str = "Machine_Predictive_Data";
pub const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";
pub const DATA_INGESTION_INGESTED_DIR: &str = "ingested";
pub const DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO: f64 = 0.2;

pub const DATA_VALIDATION_DIR_NAME: &str = "data_validation";
pub const DATA_VALIDATION_VALID_DIR: &str = "validated";
pub const DATA_VALIDATION_INVALID_DIR: &str = "invalid";
pub const DATA_VALIDATION_DRIFT_REPORT_DIR: &str = "drift_report";
pub const DATA_VALIDATION_DRIFT_REPORT_FILE_NAME: &str = "report.yaml";
pub const DATA_VALIDATION_DRIFT_THRESHOLD: f64 = 0.05;

pub const DATA_TRANSFORMATION_DIR_NAME: &str = "data_transformation";
pub const DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR: &str = "transformed";
pub const DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.bin";
pub const TRANSFORMED_TRAIN_FILE_NAME: &str = "train.bin";
pub const TRANSFORMED_TEST_FILE_NAME: &str = "test.bin";

pub const MODEL_TRAINER_DIR_NAME: &str = "model_trainer";
pub const MODEL_TRAINER_TRAINED_MODEL_DIR: &str = "trained_model";
pub const MODEL_TRAINER_TRAINED_MODEL_NAME: &str = "model.bin";
pub const MODEL_TRAINER_CV_FOLDS: usize = 5;

pub const TRACKING_DIR: &str = "mlruns";

pub const FINAL_MODEL_DIR: &str = "final_model";
pub const FINAL_PREPROCESSOR_FILE_NAME: &str = "preprocessor.bin";
pub const FINAL_MODEL_FILE_NAME: &str = "model.bin";

pub const PREDICTION_OUTPUT_DIR: &str = "prediction_output";
pub const PREDICTION_OUTPUT_FILE_NAME: &str = "output.csv";
pub const PREDICTION_COLUMN: &str = "predicted_column";
