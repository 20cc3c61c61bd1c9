//! Predictive maintenance - machine failure prediction
//!
//! A file-checkpointed training pipeline over machine telemetry plus the
//! services that use its output:
//!
//! - Ingestion of raw records from a document store, split into train and test
//! - Validation of column layout and Kolmogorov-Smirnov drift between splits
//! - Transformation: feature engineering, ordinal encoding, min-max scaling
//!   and SMOTE-ENN resampling
//! - Training: grid search over a roster of classifiers, held-out selection
//!   and experiment tracking
//! - Inference through a CLI and an HTTP service
//!
//! # Modules
//!
//! ## Pipeline
//! - [`ingestion`], [`validation`], [`transformation`] - the data stages
//! - [`training`] - estimators, grid search and the model trainer stage
//! - [`pipeline`] - runs all four stages in order
//! - [`inference`] - batch prediction with the production model
//!
//! ## Building blocks
//! - [`source`] - document store access
//! - [`drift`] - two-sample drift tests
//! - [`preprocessing`] - feature engineering, encoders and scalers
//! - [`synthetic`] - SMOTE oversampling and ENN cleaning
//! - [`tracking`] - experiment runs on the local filesystem
//! - [`config`], [`schema`], [`artifact`] - settings and stage records
//!
//! ## Services
//! - [`server`] - HTTP API
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;

// Settings and records
pub mod artifact;
pub mod config;
pub mod schema;

// Pipeline stages
pub mod ingestion;
pub mod validation;
pub mod transformation;
pub mod training;
pub mod pipeline;
pub mod inference;

// Building blocks
pub mod drift;
pub mod preprocessing;
pub mod source;
pub mod synthetic;
pub mod tracking;
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{MaintenanceError, PipelineStage, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{MaintenanceError, PipelineStage, Result};

    pub use crate::artifact::{
        ClassificationMetricArtifact, DataIngestionArtifact, DataTransformationArtifact,
        DataValidationArtifact, ModelTrainerArtifact,
    };
    pub use crate::config::PipelineSettings;
    pub use crate::schema::SchemaConfig;

    pub use crate::inference::PredictionPipeline;
    pub use crate::pipeline::{PipelineOutcome, TrainingPipeline};

    pub use crate::source::{DocumentSink, DocumentSource, FileDocumentStore};
    pub use crate::training::{
        Classifier, MaintenanceModel, ModelFamily, ModelRegistry, SelectionMetric, TrainedClassifier,
    };
    pub use crate::tracking::{ExperimentTracker, LocalTracker};
}
