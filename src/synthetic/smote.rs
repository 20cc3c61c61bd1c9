//! SMOTE oversampling

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::synthetic::{class_counts, class_indices, minority_class, nearest_neighbors, ResampleResult, Sampler};

/// Which classes are oversampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// Only the smallest class, up to the majority count
    Minority,
    /// Every class except the largest, up to the majority count
    NotMajority,
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
///
/// Each synthetic sample lies on the segment between a random sample of the
/// class and one of its `k` nearest same-class neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    sampling_strategy: SamplingStrategy,
    /// Random seed
    seed: u64,
    /// Target samples per class
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: SamplingStrategy::Minority,
            seed: 42,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_sampling_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.sampling_strategy = strategy;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(MaintenanceError::TransformationError(format!(
                "need at least 2 classes to oversample, found {}",
                counts.len()
            )));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        let minority = minority_class(&counts);
        let targets = counts
            .iter()
            .map(|(&class, &count)| {
                let oversample = match self.sampling_strategy {
                    SamplingStrategy::Minority => Some(class) == minority,
                    SamplingStrategy::NotMajority => count < max_count,
                };
                (class, if oversample { max_count } else { count })
            })
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or(MaintenanceError::ModelNotFitted)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let indices = class_indices(y);
        let n_features = x.ncols();
        let mut synthetic_x: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();

        for (&class, &target_count) in targets {
            let class_idx = match indices.get(&class) {
                Some(idx) => idx,
                None => continue,
            };
            let n_to_generate = target_count.saturating_sub(class_idx.len());
            if n_to_generate == 0 {
                continue;
            }

            let k = self.k_neighbors.min(class_idx.len() - 1);
            if k == 0 {
                return Err(MaintenanceError::TransformationError(format!(
                    "class {} has a single sample; at least 2 are needed to interpolate",
                    class
                )));
            }

            let class_samples = x.select(ndarray::Axis(0), class_idx);
            let neighbors: Vec<Vec<usize>> = (0..class_samples.nrows())
                .map(|i| nearest_neighbors(class_samples.row(i), &class_samples, k, Some(i)))
                .collect();

            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_samples.nrows());
                let neighbor = neighbors[idx][rng.gen_range(0..neighbors[idx].len())];
                let gap: f64 = rng.gen();
                let sample = class_samples.row(idx);
                let other = class_samples.row(neighbor);
                synthetic_x.extend(sample.iter().zip(other.iter()).map(|(&p, &n)| p + gap * (n - p)));
                synthetic_y.push(class);
            }
        }

        let n_synthetic = synthetic_y.len();
        let synthetic = Array2::from_shape_vec((n_synthetic, n_features), synthetic_x)?;
        let result_x = ndarray::concatenate(ndarray::Axis(0), &[x.view(), synthetic.view()])?;

        let mut all_y: Vec<i64> = y.to_vec();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
            n_removed: 0,
        })
    }
}
