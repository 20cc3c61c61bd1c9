//! Evaluation metrics
//!
//! Binary metrics treat label `1` as the positive class and report `0.0`
//! where a ratio has an empty denominator.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::artifact::ClassificationMetricArtifact;
use crate::error::MaintenanceError;

const POSITIVE_LABEL: f64 = 1.0;

fn same_label(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5
}

/// Fraction of exact label matches
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| same_label(**t, **p))
        .count();
    correct as f64 / y_true.len() as f64
}

/// (true positives, false positives, false negatives)
fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize) {
    y_true
        .iter()
        .zip(y_pred.iter())
        .fold((0, 0, 0), |(tp, fp, fn_), (&t, &p)| {
            match (same_label(t, POSITIVE_LABEL), same_label(p, POSITIVE_LABEL)) {
                (true, true) => (tp + 1, fp, fn_),
                (false, true) => (tp, fp + 1, fn_),
                (true, false) => (tp, fp, fn_ + 1),
                (false, false) => (tp, fp, fn_),
            }
        })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn precision_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (tp, fp, _) = confusion_counts(y_true, y_pred);
    ratio(tp, tp + fp)
}

pub fn recall_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (tp, _, fn_) = confusion_counts(y_true, y_pred);
    ratio(tp, tp + fn_)
}

pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (tp, fp, fn_) = confusion_counts(y_true, y_pred);
    ratio(2 * tp, 2 * tp + fp + fn_)
}

/// F1, precision and recall of the positive class
pub fn classification_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> ClassificationMetricArtifact {
    ClassificationMetricArtifact {
        f1_score: f1_score(y_true, y_pred),
        precision_score: precision_score(y_true, y_pred),
        recall_score: recall_score(y_true, y_pred),
    }
}

/// Coefficient of determination
///
/// A constant target scores `1.0` when predicted exactly and `0.0` otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return 0.0;
    }
    let mean = y_true.sum() / n as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Metric used to rank model families on the held-out split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMetric {
    /// R² of the predicted labels
    #[default]
    R2,
    F1,
    Accuracy,
}

impl SelectionMetric {
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            SelectionMetric::R2 => r2_score(y_true, y_pred),
            SelectionMetric::F1 => f1_score(y_true, y_pred),
            SelectionMetric::Accuracy => accuracy_score(y_true, y_pred),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SelectionMetric::R2 => "r2",
            SelectionMetric::F1 => "f1",
            SelectionMetric::Accuracy => "accuracy",
        }
    }
}

impl fmt::Display for SelectionMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectionMetric {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r2" => Ok(SelectionMetric::R2),
            "f1" => Ok(SelectionMetric::F1),
            "accuracy" => Ok(SelectionMetric::Accuracy),
            other => Err(MaintenanceError::ConfigError(format!(
                "unknown selection metric '{}', expected r2, f1 or accuracy",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let metrics = classification_score(&y_true, &y_pred);
        assert!((metrics.precision_score - 0.75).abs() < 1e-12);
        assert!((metrics.recall_score - 0.75).abs() < 1e-12);
        assert!((metrics.f1_score - 0.75).abs() < 1e-12);
        assert!((accuracy_score(&y_true, &y_pred) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_predictions() {
        let y = array![0.0, 1.0, 1.0, 0.0];
        let metrics = classification_score(&y, &y);
        assert_eq!(metrics.f1_score, 1.0);
        assert_eq!(metrics.precision_score, 1.0);
        assert_eq!(metrics.recall_score, 1.0);
        assert_eq!(r2_score(&y, &y), 1.0);
    }

    #[test]
    fn test_zero_division_reports_zero() {
        let y_true = array![0.0, 0.0];
        let y_pred = array![0.0, 0.0];
        let metrics = classification_score(&y_true, &y_pred);
        assert_eq!(metrics.precision_score, 0.0);
        assert_eq!(metrics.recall_score, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
    }

    #[test]
    fn test_r2_on_labels() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0];
        // ss_res = 1, ss_tot = 1
        assert_eq!(r2_score(&y_true, &y_pred), 0.0);
        assert_eq!(r2_score(&array![1.0, 1.0], &array![0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_selection_metric_parsing() {
        assert_eq!(SelectionMetric::default(), SelectionMetric::R2);
        assert_eq!("F1".parse::<SelectionMetric>().unwrap(), SelectionMetric::F1);
        assert!("auc".parse::<SelectionMetric>().is_err());
        let yaml = serde_yaml::to_string(&SelectionMetric::Accuracy).unwrap();
        assert_eq!(yaml.trim(), "accuracy");
    }
}
