//! Feature engineering applied before the preprocessor

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::schema::SchemaConfig;
use crate::utils::numeric_column;

const KELVIN_OFFSET: f64 = 273.15;

/// Add Celsius columns for the configured Kelvin sources, then drop the schema's drop columns
///
/// Conversions whose source column is absent are skipped, as are drop columns
/// that are not in the frame.
pub fn engineer_features(df: &DataFrame, schema: &SchemaConfig) -> Result<DataFrame> {
    let mut out = df.clone();
    let present = df.get_column_names_str();

    for conversion in &schema.temperature_conversions {
        if !present.contains(&conversion.source.as_str()) {
            debug!(column = %conversion.source, "Temperature source column absent");
            continue;
        }
        let celsius: Vec<f64> = numeric_column(df, &conversion.source)?
            .into_iter()
            .map(|k| k - KELVIN_OFFSET)
            .collect();
        out.with_column(Column::new(conversion.target.as_str().into(), celsius))?;
    }

    let to_drop: Vec<&str> = schema
        .drop_columns
        .iter()
        .map(String::as_str)
        .filter(|name| out.get_column_names_str().contains(name))
        .collect();
    if to_drop.len() < schema.drop_columns.len() {
        debug!(
            requested = schema.drop_columns.len(),
            dropped = to_drop.len(),
            "Some drop columns were absent"
        );
    }
    Ok(out.drop_many(to_drop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::machine_schema;

    #[test]
    fn test_temperature_conversion_and_drops() {
        let df = df! {
            "UDI" => &[1i64, 2],
            "Product ID" => &["M14860", "L47181"],
            "Type" => &["M", "L"],
            "Air temperature [K]" => &[298.1f64, 298.2],
            "Process temperature [K]" => &[308.6f64, 308.7],
            "Torque [Nm]" => &[42.8f64, 46.3],
            "Failure Type" => &["No Failure", "No Failure"],
        }
        .unwrap();

        let out = engineer_features(&df, &machine_schema()).unwrap();
        let names = out.get_column_names_str();
        assert!(!names.contains(&"UDI"));
        assert!(!names.contains(&"Air temperature [K]"));
        assert!(names.contains(&"Air temperature [c]"));

        let air = numeric_column(&out, "Air temperature [c]").unwrap();
        assert!((air[0] - 24.95).abs() < 1e-9);
        let process = numeric_column(&out, "Process temperature [c]").unwrap();
        assert!((process[1] - 35.55).abs() < 1e-9);
    }

    #[test]
    fn test_absent_columns_are_skipped() {
        let df = df! { "Type" => &["H"] }.unwrap();
        let out = engineer_features(&df, &machine_schema()).unwrap();
        assert_eq!(out.get_column_names_str(), vec!["Type"]);
    }
}
