//! Column-wise preprocessor

use std::path::Path;
use std::time::Instant;

use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MinMaxScaler, OrdinalEncoder};
use crate::error::{MaintenanceError, Result};
use crate::schema::SchemaConfig;
use crate::utils::{load_object, save_object};

/// Ordinal-encodes the ordinal columns and min-max scales the scaling features
///
/// Output columns are the ordinal block followed by the scaled block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    encoder: OrdinalEncoder,
    scaler: MinMaxScaler,
    scaling_features: Vec<String>,
    is_fitted: bool,
}

impl ColumnTransformer {
    pub fn new(encoder: OrdinalEncoder, scaling_features: Vec<String>) -> Self {
        Self {
            encoder,
            scaler: MinMaxScaler::new(),
            scaling_features,
            is_fitted: false,
        }
    }

    /// Build an unfitted preprocessor from the schema's column groups
    pub fn from_schema(schema: &SchemaConfig) -> Result<Self> {
        let encoder = OrdinalEncoder::new(
            schema.ordinal_columns.clone(),
            schema.ordinal_categories.clone(),
        )?;
        Ok(Self::new(encoder, schema.scaling_features.clone()))
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        self.encoder.fit(df)?;
        self.scaler.fit(df, &self.scaling_features)?;
        self.is_fitted = true;
        debug!(
            rows = df.height(),
            width = self.output_width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted preprocessor"
        );
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MaintenanceError::ModelNotFitted);
        }
        let ordinal = self.encoder.transform(df)?;
        let scaled = self.scaler.transform(df)?;
        Ok(concatenate(Axis(1), &[ordinal.view(), scaled.view()])?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Number of output columns
    pub fn output_width(&self) -> usize {
        self.encoder.columns().len() + self.scaling_features.len()
    }

    /// Output column names in order
    pub fn feature_names(&self) -> Vec<String> {
        self.encoder
            .columns()
            .iter()
            .chain(&self.scaling_features)
            .cloned()
            .collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Save the fitted preprocessor to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(path, self)
    }

    /// Load a preprocessor from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }
}
