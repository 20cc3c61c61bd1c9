//! Dataset schema loaded from YAML
//!
//! The document lists every expected column with its dtype, then the column
//! groups each stage works on:
//!
//! ```yaml
//! columns:
//!   - UDI: int64
//!   - Type: object
//! numerical_columns: [UDI]
//! categorical_columns: [Type]
//! ordinal_columns: [Type]
//! ordinal_categories: [[L, M, H]]
//! scaling_features: []
//! drop_columns: [UDI]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};

/// A column whose values are converted from Kelvin to Celsius before encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureConversion {
    pub source: String,
    pub target: String,
}

impl TemperatureConversion {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

fn default_target_column() -> String {
    "Target".to_string()
}

fn default_temperature_conversions() -> Vec<TemperatureConversion> {
    vec![
        TemperatureConversion::new("Air temperature [K]", "Air temperature [c]"),
        TemperatureConversion::new("Process temperature [K]", "Process temperature [c]"),
    ]
}

/// Expected layout of the telemetry table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Every expected column, in order, as single-entry `{name: dtype}` maps
    pub columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub ordinal_columns: Vec<String>,
    /// One ordered category list per entry of `ordinal_columns`
    #[serde(default)]
    pub ordinal_categories: Vec<Vec<String>>,
    #[serde(default)]
    pub scaling_features: Vec<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default = "default_target_column")]
    pub target_column: String,
    #[serde(default = "default_temperature_conversions")]
    pub temperature_conversions: Vec<TemperatureConversion>,
}

impl SchemaConfig {
    /// Read and check a schema document
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MaintenanceError::SchemaError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let schema: Self = serde_yaml::from_str(contents)
            .map_err(|e| MaintenanceError::SchemaError(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(entry) = self.columns.iter().find(|entry| entry.len() != 1) {
            return Err(MaintenanceError::SchemaError(format!(
                "each column entry must map one name to a dtype, got {:?}",
                entry
            )));
        }
        if self.ordinal_columns.len() != self.ordinal_categories.len() {
            return Err(MaintenanceError::SchemaError(format!(
                "{} ordinal columns but {} category lists",
                self.ordinal_columns.len(),
                self.ordinal_categories.len()
            )));
        }
        if let Some((column, _)) = self
            .ordinal_columns
            .iter()
            .zip(&self.ordinal_categories)
            .find(|(_, categories)| categories.is_empty())
        {
            return Err(MaintenanceError::SchemaError(format!(
                "ordinal column '{}' has no categories",
                column
            )));
        }
        Ok(())
    }

    /// Total number of expected columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Expected column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .flat_map(|entry| entry.keys().map(String::as_str))
            .collect()
    }

    /// Numerical followed by categorical columns
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.numerical_columns
            .iter()
            .chain(&self.categorical_columns)
            .map(String::as_str)
    }

    /// Width of the preprocessor output
    pub fn feature_width(&self) -> usize {
        self.ordinal_columns.len() + self.scaling_features.len()
    }
}
