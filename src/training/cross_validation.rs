//! Stratified k-fold splitting

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MaintenanceError, Result};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold without shuffling
///
/// Classes are dealt round-robin over the folds in label order to size each
/// fold, then every class fills its folds with consecutive samples in input
/// order, so each fold's class mix tracks the whole set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(MaintenanceError::InvalidParameter {
                name: "n_splits".to_string(),
                value: n_splits.to_string(),
                reason: "at least 2 folds are needed".to_string(),
            });
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if y.len() < n_splits {
            return Err(MaintenanceError::ValidationError(format!(
                "n_splits ({}) cannot exceed the number of samples ({})",
                n_splits,
                y.len()
            )));
        }

        let mut class_rows: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &v) in y.iter().enumerate() {
            class_rows.entry(v.round() as i64).or_default().push(i);
        }
        let largest = class_rows.values().map(Vec::len).max().unwrap_or(0);
        if largest < n_splits {
            return Err(MaintenanceError::ValidationError(format!(
                "n_splits ({}) exceeds the size of every class",
                n_splits
            )));
        }
        if let Some(smallest) = class_rows.values().map(Vec::len).min() {
            if smallest < n_splits {
                warn!(smallest, n_splits, "Least populated class has fewer members than folds");
            }
        }

        // Label-sorted samples dealt round-robin give the per-fold class counts
        let sorted_labels: Vec<usize> = class_rows
            .values()
            .enumerate()
            .flat_map(|(class, rows)| std::iter::repeat(class).take(rows.len()))
            .collect();
        let mut allocation = vec![vec![0usize; class_rows.len()]; n_splits];
        for (pos, &class) in sorted_labels.iter().enumerate() {
            allocation[pos % n_splits][class] += 1;
        }

        let mut test_fold = vec![0usize; y.len()];
        for (class, rows) in class_rows.values().enumerate() {
            let mut cursor = rows.iter();
            for (fold, counts) in allocation.iter().enumerate() {
                for &row in cursor.by_ref().take(counts[class]) {
                    test_fold[row] = fold;
                }
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_fold[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_every_sample_tested_once() {
        let y = Array1::from_iter((0..23).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }));
        let splits = StratifiedKFold::new(5).unwrap().split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..23).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
        }
    }

    #[test]
    fn test_folds_keep_class_balance() {
        let y = Array1::from_iter((0..50).map(|i| if i < 10 { 1.0 } else { 0.0 }));
        let splits = StratifiedKFold::new(5).unwrap().split(&y).unwrap();
        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 2);
            assert_eq!(split.test_indices.len(), 10);
        }
    }

    #[test]
    fn test_consecutive_assignment_without_shuffle() {
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let splits = StratifiedKFold::new(2).unwrap().split(&y).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 4, 5]);
        assert_eq!(splits[1].test_indices, vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(StratifiedKFold::new(1).is_err());
        let y = array![0.0, 1.0];
        assert!(StratifiedKFold::new(3).unwrap().split(&y).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.8, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!((results.std_score - 0.1).abs() < 1e-12);
    }
}
