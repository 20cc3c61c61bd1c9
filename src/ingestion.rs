//! Data ingestion stage
//!
//! Exports the raw collection into a feature store CSV, then splits it into
//! train and test files.

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::artifact::DataIngestionArtifact;
use crate::config::DataIngestionConfig;
use crate::error::{MaintenanceError, Result};
use crate::source::{documents_to_frame, DocumentSource};
use crate::utils::DataSaver;

pub struct DataIngestion<'a> {
    config: DataIngestionConfig,
    source: &'a dyn DocumentSource,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: DataIngestionConfig, source: &'a dyn DocumentSource) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &DataIngestionConfig {
        &self.config
    }

    /// Read the configured collection as a table
    pub fn export_collection_as_frame(&self) -> Result<DataFrame> {
        let documents = self
            .source
            .fetch_all(&self.config.database_name, &self.config.collection_name)?;
        let df = documents_to_frame(&documents)?;
        info!(
            database = %self.config.database_name,
            collection = %self.config.collection_name,
            rows = df.height(),
            cols = df.width(),
            "Exported collection"
        );
        Ok(df)
    }

    /// Snapshot the raw table to the feature store
    pub fn export_data_into_feature_store(&self, mut df: DataFrame) -> Result<DataFrame> {
        DataSaver::save_csv(&mut df, &self.config.feature_store_file_path)?;
        info!(path = %self.config.feature_store_file_path.display(), "Wrote feature store");
        Ok(df)
    }

    /// Shuffle rows and write the train and test splits
    pub fn split_data_as_train_test(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let (mut train, mut test) =
            split_frame(df, self.config.train_test_split_ratio, self.config.random_seed)?;
        info!(train_rows = train.height(), test_rows = test.height(), "Performed train test split");

        DataSaver::save_csv(&mut train, &self.config.training_file_path)?;
        DataSaver::save_csv(&mut test, &self.config.testing_file_path)?;
        Ok((train, test))
    }

    pub fn initiate_data_ingestion(&self) -> Result<DataIngestionArtifact> {
        info!("Starting data ingestion");
        let df = self.export_collection_as_frame()?;
        let df = self.export_data_into_feature_store(df)?;
        self.split_data_as_train_test(&df)?;

        Ok(DataIngestionArtifact {
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        })
    }
}

/// Split rows by a seeded permutation; the test side gets `ceil(ratio * n)` rows
pub fn split_frame(df: &DataFrame, ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(MaintenanceError::InvalidParameter {
            name: "train_test_split_ratio".to_string(),
            value: ratio.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    let n_test = (ratio * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(MaintenanceError::IngestionError(format!(
            "cannot split {} rows with test ratio {}: one side would be empty",
            n, ratio
        )));
    }

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_idx = IdxCa::from_vec("idx".into(), indices[..n_test].to_vec());
    let train_idx = IdxCa::from_vec("idx".into(), indices[n_test..].to_vec());
    Ok((df.take(&train_idx)?, df.take(&test_idx)?))
}
