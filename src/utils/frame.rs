//! Conversions between polars frames and ndarray arrays

use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::error::{MaintenanceError, Result};

fn lookup<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| MaintenanceError::FeatureNotFound(name.to_string()))
}

/// Values of a column as `f64`; nulls and unparsable entries become NaN
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = lookup(df, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Values of a column rendered as strings; nulls stay `None`
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = lookup(df, name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Stack the named columns into a row-major matrix
pub fn feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut x = Array2::zeros((n_rows, columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let values = numeric_column(df, name)?;
        for (i, v) in values.into_iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

/// Class labels of a column; every entry must be a whole number
pub fn label_vector(df: &DataFrame, name: &str) -> Result<Array1<i64>> {
    numeric_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(MaintenanceError::DataError(format!(
                    "label column '{}' has non-integer value {} at row {}",
                    name, v, row
                )))
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(Array1::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_matrix() {
        let df = df! {
            "a" => &[1i64, 2, 3],
            "b" => &[0.5f64, 1.5, 2.5],
        }
        .unwrap();
        let x = feature_matrix(&df, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(x.shape(), &[3, 2]);
        assert_eq!(x[[0, 0]], 0.5);
        assert_eq!(x[[2, 1]], 3.0);
    }

    #[test]
    fn test_nulls_become_nan() {
        let df = df! { "a" => &[Some(1.0f64), None] }.unwrap();
        let values = numeric_column(&df, "a").unwrap();
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_label_vector_rejects_fractions() {
        let df = df! { "Target" => &[0.0f64, 1.0, 0.5] }.unwrap();
        assert!(label_vector(&df, "Target").is_err());

        let df = df! { "Target" => &[0i64, 1, 1] }.unwrap();
        assert_eq!(label_vector(&df, "Target").unwrap().to_vec(), vec![0, 1, 1]);
    }

    #[test]
    fn test_missing_column() {
        let df = df! { "a" => &[1i64] }.unwrap();
        assert!(matches!(
            numeric_column(&df, "b"),
            Err(MaintenanceError::FeatureNotFound(_))
        ));
    }
}
