//! Drift detection
//!
//! Compares the marginal distribution of each column between a reference
//! table and a current table.

mod data_drift;

pub use data_drift::KolmogorovSmirnovTest;

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Drift detection result for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// Whether drift was detected
    pub drift_detected: bool,
    /// Test statistic
    pub score: f64,
    pub p_value: f64,
    /// Significance level used for detection
    pub threshold: f64,
}

/// Trait for two-sample drift detectors
pub trait DriftDetector: Send + Sync {
    /// Detect drift between reference and test samples
    fn detect(&self, reference: &Array1<f64>, test: &Array1<f64>) -> Result<DriftResult>;

    /// Get the threshold used for detection
    fn threshold(&self) -> f64;
}

/// Per-column entry of a drift report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub p_value: f64,
    pub drift_status: bool,
}

/// Drift findings for every shared column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftReport {
    columns: BTreeMap<String, ColumnDrift>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, drift: ColumnDrift) {
        self.columns.insert(column.into(), drift);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDrift> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDrift)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when no column drifted
    pub fn is_drift_free(&self) -> bool {
        self.columns.values().all(|c| !c.drift_status)
    }

    pub fn drifted_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.drift_status)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_fold() {
        let mut report = DriftReport::new();
        assert!(report.is_drift_free());

        report.insert("Torque [Nm]", ColumnDrift { p_value: 0.4, drift_status: false });
        assert!(report.is_drift_free());

        report.insert("Tool wear [min]", ColumnDrift { p_value: 0.001, drift_status: true });
        assert!(!report.is_drift_free());
        assert_eq!(report.drifted_columns(), vec!["Tool wear [min]"]);
    }

    #[test]
    fn test_report_yaml_shape() {
        let mut report = DriftReport::new();
        report.insert("Type", ColumnDrift { p_value: 1.0, drift_status: false });
        let yaml = serde_yaml::to_string(&report).unwrap();
        assert!(yaml.starts_with("Type:"));
        assert!(yaml.contains("p_value: 1.0"));
        assert!(yaml.contains("drift_status: false"));
    }
}
