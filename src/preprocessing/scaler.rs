//! Min-max feature scaling

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::utils::{feature_matrix, numeric_column};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    min: f64,
    range: f64,
}

/// Min-Max scaler: (x - min) / (max - min)
///
/// Missing values are ignored when fitting and stay NaN after transforming.
/// A constant column gets a range of 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinMaxScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the minimum and range of each column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for name in columns {
            let values = numeric_column(df, name)?;
            let (min, max) = values
                .iter()
                .filter(|v| !v.is_nan())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if !min.is_finite() {
                return Err(MaintenanceError::TransformationError(format!(
                    "cannot scale column '{}' without any values",
                    name
                )));
            }
            let range = max - min;
            params.push(ScalerParams {
                min,
                range: if range == 0.0 { 1.0 } else { range },
            });
        }

        self.columns = columns.to_vec();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scaled values of the fitted columns, one output column per input column
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MaintenanceError::ModelNotFitted);
        }

        let mut out = feature_matrix(df, &self.columns)?;
        for (mut column, params) in out.columns_mut().into_iter().zip(&self.params) {
            column.mapv_inplace(|v| (v - params.min) / params.range);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Map scaled values back to the original units
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MaintenanceError::ModelNotFitted);
        }
        if scaled.ncols() != self.params.len() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", scaled.ncols()),
            });
        }

        let mut out = scaled.clone();
        for (mut column, params) in out.columns_mut().into_iter().zip(&self.params) {
            column.mapv_inplace(|v| v * params.range + params.min);
        }
        Ok(out)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
