//! AdaBoost (SAMME) over decision stumps
//!
//! Each round fits the stump with the lowest weighted error, weights it by
//! `learning_rate * (ln((1 - err) / err) + ln(K - 1))` and boosts the weight
//! of the samples it misclassified.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::training::{check_fit_input, sorted_classes, Classifier};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Class index predicted when feature <= threshold
    left: usize,
    /// Class index predicted when feature > threshold
    right: usize,
}

impl Stump {
    fn predict_row(&self, row: ArrayView1<f64>) -> usize {
        if row[self.feature_index] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (j, &v)| if v > values[best] { j } else { best })
}

/// AdaBoost classifier (SAMME, multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    n_estimators: usize,
    learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    /// Weighted majority class, predicted when no stump was kept
    fallback: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            fallback: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Number of stumps kept after early stopping
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Lowest weighted-error stump; `orders` holds each feature's row order
    fn fit_stump(
        x: &Array2<f64>,
        labels: &[usize],
        weights: &[f64],
        n_classes: usize,
        orders: &[Vec<usize>],
    ) -> Option<(Stump, f64)> {
        let total: Vec<f64> = labels.iter().zip(weights).fold(vec![0.0; n_classes], |mut acc, (&c, &w)| {
            acc[c] += w;
            acc
        });
        let total_weight: f64 = total.iter().sum();

        let per_feature: Vec<Option<(Stump, f64)>> = orders
            .par_iter()
            .enumerate()
            .map(|(f, order)| {
                let mut left = vec![0.0; n_classes];
                let mut best: Option<(Stump, f64)> = None;
                for pos in 0..order.len().saturating_sub(1) {
                    let i = order[pos];
                    left[labels[i]] += weights[i];
                    let (v, next) = (x[[i, f]], x[[order[pos + 1], f]]);
                    if next <= v {
                        continue;
                    }
                    let right: Vec<f64> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                    let (l, r) = (argmax(&left), argmax(&right));
                    let error = total_weight - left[l] - right[r];
                    if best.as_ref().map_or(true, |(_, e)| error < *e) {
                        best = Some((
                            Stump {
                                feature_index: f,
                                threshold: (v + next) / 2.0,
                                left: l,
                                right: r,
                            },
                            error,
                        ));
                    }
                }
                best
            })
            .collect();

        per_feature.into_iter().flatten().fold(None, |best, c| match best {
            Some(b) if b.1 <= c.1 => Some(b),
            _ => Some(c),
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        if !(self.learning_rate > 0.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let classes = sorted_classes(y);
        let n_classes = classes.len();
        let labels: Vec<usize> = y
            .iter()
            .map(|v| classes.binary_search_by(|c| c.total_cmp(v)).unwrap_or(0))
            .collect();
        let n_samples = x.nrows();
        let mut weights = vec![1.0 / n_samples as f64; n_samples];

        let orders: Vec<Vec<usize>> = (0..x.ncols())
            .map(|f| {
                let mut order: Vec<usize> = (0..n_samples).collect();
                order.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));
                order
            })
            .collect();

        let mut class_weight = vec![0.0; n_classes];
        for &c in &labels {
            class_weight[c] += 1.0;
        }
        self.fallback = argmax(&class_weight);
        self.stumps.clear();
        self.alphas.clear();
        self.classes = classes;

        let random_guess = 1.0 - 1.0 / n_classes.max(2) as f64;
        for _ in 0..self.n_estimators {
            let (stump, error) = match Self::fit_stump(x, &labels, &weights, n_classes, &orders) {
                Some(found) => found,
                // Every feature is constant
                None => break,
            };
            let weight_sum: f64 = weights.iter().sum();
            let error = error / weight_sum;

            if error <= 0.0 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= random_guess {
                break;
            }

            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + ((n_classes as f64) - 1.0).max(1.0).ln());
            for (i, w) in weights.iter_mut().enumerate() {
                if stump.predict_row(x.row(i)) != labels[i] {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= total);

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(MaintenanceError::ModelNotFitted);
        }
        let n_classes = self.classes.len();
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                if self.stumps.is_empty() {
                    return self.classes[self.fallback];
                }
                let mut votes = vec![0.0; n_classes];
                for (stump, alpha) in self.stumps.iter().zip(&self.alphas) {
                    votes[stump.predict_row(row)] += alpha;
                }
                self.classes[argmax(&votes)]
            })
            .collect())
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostClassifier::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}
