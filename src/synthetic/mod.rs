//! Class rebalancing
//!
//! - SMOTE oversampling of the minority class
//! - Edited nearest neighbours cleaning
//! - [`SmoteEnn`] chaining both

mod enn;
mod smote;

pub use enn::{CleaningScope, EditedNearestNeighbours};
pub use smote::{SamplingStrategy, SMOTE};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Number of synthetic samples generated
    pub n_synthetic: usize,
    /// Number of samples removed by cleaning
    pub n_removed: usize,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Get class distribution, ordered by label
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class, ordered by label
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

/// Smallest class; ties go to the lower label
pub fn minority_class(counts: &BTreeMap<i64, usize>) -> Option<i64> {
    counts
        .iter()
        .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
        .map(|(&class, _)| class)
}

/// Distance and row index ordered for a max-heap of nearest neighbours
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Indices of the `k` rows of `candidates` nearest to `point`, skipping row `exclude`
///
/// Ties are broken by the lower row index. Result is ordered nearest first.
fn nearest_neighbors(
    point: ArrayView1<f64>,
    candidates: &Array2<f64>,
    k: usize,
    exclude: Option<usize>,
) -> Vec<usize> {
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
    for (i, row) in candidates.rows().into_iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        let candidate = DistIdx(squared_distance(point, row), i);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }
    heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
}

/// Parameters of the combined rebalancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResamplingConfig {
    /// Neighbours used to interpolate synthetic samples
    pub k_neighbors: usize,
    /// Neighbours consulted when cleaning
    pub enn_neighbors: usize,
    /// Classes the cleaning step may remove samples from
    pub cleaning: CleaningScope,
    /// Rebalance the transformed test set as well as the train set
    pub apply_to_test: bool,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            enn_neighbors: 3,
            cleaning: CleaningScope::Majority,
            apply_to_test: true,
        }
    }
}

/// SMOTE oversampling of the minority class followed by ENN cleaning
#[derive(Debug, Clone)]
pub struct SmoteEnn {
    smote: SMOTE,
    enn: EditedNearestNeighbours,
}

impl SmoteEnn {
    pub fn new(config: &ResamplingConfig, seed: u64) -> Self {
        Self {
            smote: SMOTE::new()
                .with_k_neighbors(config.k_neighbors)
                .with_sampling_strategy(SamplingStrategy::Minority)
                .with_seed(seed),
            enn: EditedNearestNeighbours::new()
                .with_n_neighbors(config.enn_neighbors)
                .with_scope(config.cleaning),
        }
    }
}

impl Sampler for SmoteEnn {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        self.smote.fit(x, y)?;
        // After oversampling the classes are tied, so the class to spare is
        // taken from the labels as they arrive
        if self.enn.scope() == CleaningScope::Majority {
            let minority = minority_class(&class_counts(y));
            self.enn = self.enn.clone().with_protected_class(minority);
        }
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let oversampled = self.smote.resample(x, y)?;
        let cleaned = self.enn.resample(&oversampled.x, &oversampled.y)?;
        debug!(
            rows_in = x.nrows(),
            synthetic = oversampled.n_synthetic,
            removed = cleaned.n_removed,
            rows_out = cleaned.x.nrows(),
            "Rebalanced classes"
        );
        Ok(ResampleResult {
            x: cleaned.x,
            y: cleaned.y,
            n_synthetic: oversampled.n_synthetic,
            n_removed: cleaned.n_removed,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    /// 40 majority rows around the origin, 8 minority rows around (10, 10),
    /// and 2 majority rows sitting inside the minority cluster
    pub(crate) fn imbalanced_data() -> (Array2<f64>, Array1<i64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            data.push((i % 8) as f64 * 0.5);
            data.push((i / 8) as f64 * 0.5);
            labels.push(0i64);
        }
        for i in 0..8 {
            data.push(10.0 + (i % 4) as f64 * 0.5);
            data.push(10.0 + (i / 4) as f64 * 0.5);
            labels.push(1i64);
        }
        data.extend_from_slice(&[10.2, 10.2, 10.7, 10.3]);
        labels.extend_from_slice(&[0, 0]);

        let x = Array2::from_shape_vec((50, 2), data).unwrap();
        (x, Array1::from_vec(labels))
    }

    #[test]
    fn test_class_helpers() {
        let y = array![1i64, 0, 1, 1, 2];
        let counts = class_counts(&y);
        assert_eq!(counts[&1], 3);
        assert_eq!(minority_class(&counts), Some(0));
        assert_eq!(class_indices(&y)[&1], vec![0, 2, 3]);
    }

    #[test]
    fn test_nearest_neighbors_order() {
        let x = array![[0.0], [3.0], [1.0], [1.0], [10.0]];
        let nn = nearest_neighbors(x.row(0), &x, 3, Some(0));
        assert_eq!(nn, vec![2, 3, 1]);
    }

    #[test]
    fn test_smote_enn_balances_and_cleans() {
        let (x, y) = imbalanced_data();
        let config = ResamplingConfig::default();
        let mut sampler = SmoteEnn::new(&config, 42);
        let result = sampler.fit_resample(&x, &y).unwrap();

        assert_eq!(result.n_synthetic, 42 - 8);
        assert!(result.n_removed >= 2);
        let counts = class_counts(&result.y);
        assert_eq!(counts[&1], 42);
        assert!(counts[&0] <= 40);
        assert_eq!(result.x.nrows(), result.y.len());
    }

    #[test]
    fn test_smote_enn_spares_original_minority() {
        let (x, y) = imbalanced_data();
        let mut sampler = SmoteEnn::new(&ResamplingConfig::default(), 7);
        let result = sampler.fit_resample(&x, &y).unwrap();

        let rows: Vec<(f64, f64, i64)> = result
            .x
            .rows()
            .into_iter()
            .zip(result.y.iter())
            .map(|(r, &label)| (r[0], r[1], label))
            .collect();
        for (i, &label) in y.iter().enumerate() {
            if label == 1 {
                assert!(rows.contains(&(x[[i, 0]], x[[i, 1]], 1)), "minority row {} removed", i);
            }
        }
        // Majority rows sitting inside the minority cluster are cleaned away
        assert!(!rows.contains(&(10.2, 10.2, 0)));
        assert!(!rows.contains(&(10.7, 10.3, 0)));
        assert_eq!(class_counts(&result.y)[&0], 40);
    }

    #[test]
    fn test_smote_enn_deterministic() {
        let (x, y) = imbalanced_data();
        let config = ResamplingConfig::default();
        let a = SmoteEnn::new(&config, 3).fit_resample(&x, &y).unwrap();
        let b = SmoteEnn::new(&config, 3).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }
}
