//! Training pipeline orchestration
//!
//! Runs ingestion, validation, transformation and training in order. Each
//! stage hands the next an artifact describing its files on disk; any failure
//! stops the run and is reported with the stage it happened in.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::artifact::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, ModelTrainerArtifact,
};
use crate::config::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, ModelTrainerConfig, PipelineSettings,
    TrainingPipelineConfig,
};
use crate::error::{PipelineStage, Result, StageContext};
use crate::ingestion::DataIngestion;
use crate::schema::SchemaConfig;
use crate::source::{DocumentSource, FileDocumentStore};
use crate::training::{ModelRegistry, ModelTrainer};
use crate::transformation::DataTransformation;
use crate::validation::DataValidation;

/// Artifacts of a completed run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run: TrainingPipelineConfig,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub training: ModelTrainerArtifact,
}

pub struct TrainingPipeline {
    settings: PipelineSettings,
    run: TrainingPipelineConfig,
    source: Arc<dyn DocumentSource>,
    registry: ModelRegistry,
}

impl TrainingPipeline {
    /// Pipeline reading from the file document store named in the settings
    pub fn new(settings: PipelineSettings) -> Self {
        let source = Arc::new(FileDocumentStore::new(&settings.document_store_root));
        Self::with_source(settings, source)
    }

    pub fn with_source(settings: PipelineSettings, source: Arc<dyn DocumentSource>) -> Self {
        Self {
            run: TrainingPipelineConfig::new(&settings),
            settings,
            source,
            registry: ModelRegistry::default_roster(),
        }
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Identity and directory of this run
    pub fn run_config(&self) -> &TrainingPipelineConfig {
        &self.run
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn start_data_ingestion(&self) -> Result<DataIngestionArtifact> {
        let config = DataIngestionConfig::new(&self.run, &self.settings);
        DataIngestion::new(config, self.source.as_ref())
            .initiate_data_ingestion()
            .in_stage(PipelineStage::Ingestion)
    }

    pub fn start_data_validation(
        &self,
        ingestion: DataIngestionArtifact,
        schema: &SchemaConfig,
    ) -> Result<DataValidationArtifact> {
        let config = DataValidationConfig::new(&self.run, &self.settings);
        DataValidation::new(ingestion, config, schema.clone())
            .initiate_data_validation()
            .in_stage(PipelineStage::Validation)
    }

    pub fn start_data_transformation(
        &self,
        validation: DataValidationArtifact,
        schema: &SchemaConfig,
    ) -> Result<DataTransformationArtifact> {
        let config = DataTransformationConfig::new(&self.run, &self.settings);
        DataTransformation::new(validation, config, schema.clone())
            .initiate_data_transformation()
            .in_stage(PipelineStage::Transformation)
    }

    pub fn start_model_trainer(&self, transformation: DataTransformationArtifact) -> Result<ModelTrainerArtifact> {
        let config = ModelTrainerConfig::new(&self.run, &self.settings);
        ModelTrainer::new(transformation, config)
            .with_registry(self.registry.clone())
            .initiate_model_trainer()
            .in_stage(PipelineStage::Training)
    }

    /// Run every stage in order
    pub fn run_pipeline(&self) -> Result<PipelineOutcome> {
        let started = Instant::now();
        info!(
            pipeline = %self.run.pipeline_name,
            run_dir = %self.run.artifact_dir.display(),
            "Starting training pipeline"
        );
        let schema = SchemaConfig::from_yaml_file(&self.settings.schema_path).in_stage(PipelineStage::Validation)?;

        let ingestion = self.start_data_ingestion()?;
        let validation = self.start_data_validation(ingestion.clone(), &schema)?;
        if !validation.validation_status {
            info!(report = %validation.drift_report_file_path.display(), "Drift detected, continuing");
        }
        let transformation = self.start_data_transformation(validation.clone(), &schema)?;
        let training = self.start_model_trainer(transformation.clone())?;

        info!(
            model = %training.best_model_name,
            test_f1 = training.test_metric_artifact.f1_score,
            elapsed_s = started.elapsed().as_secs_f64(),
            "Finished training pipeline"
        );
        Ok(PipelineOutcome {
            run: self.run.clone(),
            ingestion,
            validation,
            transformation,
            training,
        })
    }
}
