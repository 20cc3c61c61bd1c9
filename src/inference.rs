//! Batch prediction with the production model
//!
//! Loads the preprocessor and model the last training run copied into the
//! final model directory and labels raw machine readings with them.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::config::constants::{PREDICTION_COLUMN, PREDICTION_OUTPUT_FILE_NAME};
use crate::config::PipelineSettings;
use crate::error::{MaintenanceError, Result};
use crate::preprocessing::ColumnTransformer;
use crate::schema::SchemaConfig;
use crate::training::{MaintenanceModel, TrainedClassifier};
use crate::utils::{DataLoader, DataSaver};

#[derive(Debug)]
pub struct PredictionPipeline {
    model: MaintenanceModel,
    schema: SchemaConfig,
    output_dir: PathBuf,
}

impl PredictionPipeline {
    pub fn new(model: MaintenanceModel, schema: SchemaConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            schema,
            output_dir: output_dir.into(),
        }
    }

    /// Load the final preprocessor, model and schema named by the settings
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        let preprocessor_path = settings.final_preprocessor_path();
        let model_path = settings.final_model_path();
        for path in [&preprocessor_path, &model_path] {
            if !path.is_file() {
                return Err(MaintenanceError::ConfigError(format!(
                    "{} not found; run training first",
                    path.display()
                )));
            }
        }
        let preprocessor = ColumnTransformer::load(&preprocessor_path)?;
        let model = TrainedClassifier::load(&model_path)?;
        let schema = SchemaConfig::from_yaml_file(&settings.schema_path)?;
        info!(
            preprocessor = %preprocessor_path.display(),
            model = %model_path.display(),
            "Loaded production model"
        );
        Ok(Self::new(
            MaintenanceModel::new(preprocessor, model),
            schema,
            &settings.prediction_output_dir,
        ))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(PREDICTION_OUTPUT_FILE_NAME)
    }

    /// The input table with a `predicted_column` of integer labels appended
    pub fn predict(&self, df: &DataFrame) -> Result<DataFrame> {
        if df.height() == 0 {
            return Err(MaintenanceError::DataError("no rows to predict".to_string()));
        }
        let predictions: Vec<i64> = self
            .model
            .predict_frame(df, &self.schema)?
            .iter()
            .map(|&v| v.round() as i64)
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new(PREDICTION_COLUMN.into(), predictions))?;
        info!(rows = out.height(), "Predicted machine failures");
        Ok(out)
    }

    /// Predict and write the labelled table to the output file
    pub fn predict_and_save(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = self.predict(df)?;
        DataSaver::save_csv(&mut out, self.output_path())?;
        info!(path = %self.output_path().display(), "Wrote predictions");
        Ok(out)
    }

    pub fn predict_csv_file(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let df = DataLoader::new().load_csv(path)?;
        self.predict_and_save(&df)
    }

    /// Predict on CSV bytes and return the labelled table as CSV bytes
    pub fn predict_csv_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let df = DataLoader::new().load_csv_bytes(data)?;
        let mut out = self.predict_and_save(&df)?;
        DataSaver::to_csv_bytes(&mut out)
    }
}
