//! Ordinal encoding with declared category orders

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::utils::string_column;

/// Maps each category to its position in a declared ordering
///
/// Values outside the declared categories, including missing values, are
/// rejected rather than silently encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OrdinalEncoder {
    /// One ordered category list per column
    pub fn new(columns: Vec<String>, categories: Vec<Vec<String>>) -> Result<Self> {
        if columns.len() != categories.len() {
            return Err(MaintenanceError::InvalidParameter {
                name: "categories".to_string(),
                value: categories.len().to_string(),
                reason: format!("expected one category list per column ({})", columns.len()),
            });
        }
        Ok(Self {
            columns,
            categories,
            is_fitted: false,
        })
    }

    /// Check that every column is present and holds only known categories
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.encode(df)?;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MaintenanceError::ModelNotFitted);
        }
        self.encode(df)
    }

    fn encode(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((df.height(), self.columns.len()));
        for (j, (name, categories)) in self.columns.iter().zip(&self.categories).enumerate() {
            for (i, value) in string_column(df, name)?.into_iter().enumerate() {
                let code = value
                    .as_deref()
                    .and_then(|v| categories.iter().position(|c| c == v))
                    .ok_or_else(|| {
                        MaintenanceError::TransformationError(format!(
                            "unknown category {:?} in column '{}' at row {}; expected one of {:?}",
                            value, name, i, categories
                        ))
                    })?;
                out[[i, j]] = code as f64;
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn type_encoder() -> OrdinalEncoder {
        OrdinalEncoder::new(
            vec!["Type".to_string()],
            vec![vec!["L".to_string(), "M".to_string(), "H".to_string()]],
        )
        .unwrap()
    }

    #[test]
    fn test_declared_order() {
        let df = df! { "Type" => &["H", "L", "M", "L"] }.unwrap();
        let mut encoder = type_encoder();
        encoder.fit(&df).unwrap();
        let encoded = encoder.transform(&df).unwrap();
        assert_eq!(encoded.column(0).to_vec(), vec![2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category() {
        let df = df! { "Type" => &["L", "X"] }.unwrap();
        let mut encoder = type_encoder();
        let err = encoder.fit(&df).unwrap_err();
        assert!(err.to_string().contains("\"X\""));
    }

    #[test]
    fn test_missing_value_rejected() {
        let df = df! { "Type" => &[Some("L"), None] }.unwrap();
        assert!(type_encoder().fit(&df).is_err());
    }

    #[test]
    fn test_mismatched_lists() {
        assert!(OrdinalEncoder::new(vec!["a".to_string()], vec![]).is_err());
    }
}
