//! Error types for the predictive maintenance pipeline

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MaintenanceError>;

/// The four stages of a training run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Ingestion,
    Validation,
    Transformation,
    Training,
}

impl PipelineStage {
    /// All stages in the order a run executes them
    pub const ORDER: [PipelineStage; 4] = [
        PipelineStage::Ingestion,
        PipelineStage::Validation,
        PipelineStage::Transformation,
        PipelineStage::Training,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Ingestion => "data_ingestion",
            PipelineStage::Validation => "data_validation",
            PipelineStage::Transformation => "data_transformation",
            PipelineStage::Training => "model_trainer",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Ingestion error: {0}")]
    IngestionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transformation error: {0}")]
    TransformationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// Any failure raised inside a stage, tagged with where it surfaced
    #[error("Error occurred in stage [{stage}] at [{location}]: {source}")]
    StageFailed {
        stage: PipelineStage,
        location: &'static Location<'static>,
        #[source]
        source: Box<MaintenanceError>,
    },
}

impl MaintenanceError {
    /// Wrap an error with the stage and the caller's source location
    #[track_caller]
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        MaintenanceError::StageFailed {
            stage,
            location: Location::caller(),
            source: Box::new(self),
        }
    }

    /// The stage that failed, if this error crossed a stage boundary
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            MaintenanceError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Attach stage context to any pipeline result
pub trait StageContext<T> {
    #[track_caller]
    fn in_stage(self, stage: PipelineStage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    #[track_caller]
    fn in_stage(self, stage: PipelineStage) -> Result<T> {
        let location = Location::caller();
        self.map_err(|source| MaintenanceError::StageFailed {
            stage,
            location,
            source: Box::new(source),
        })
    }
}

impl From<polars::error::PolarsError> for MaintenanceError {
    fn from(err: polars::error::PolarsError) -> Self {
        MaintenanceError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MaintenanceError {
    fn from(err: serde_json::Error) -> Self {
        MaintenanceError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for MaintenanceError {
    fn from(err: serde_yaml::Error) -> Self {
        MaintenanceError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for MaintenanceError {
    fn from(err: bincode::Error) -> Self {
        MaintenanceError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MaintenanceError {
    fn from(err: ndarray::ShapeError) -> Self {
        MaintenanceError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
