//! Gradient boosting classifier
//!
//! Binary log-loss boosting: each stage fits a regression tree to the
//! residuals `y - p`, then replaces its leaf outputs with a Newton step
//! `sum(residual) / sum(p * (1 - p))` over the rows that reached the leaf.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{MaintenanceError, Result};
use crate::training::{check_fit_input, sorted_classes, Classifier};

/// Gradient boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting stages
    pub n_estimators: usize,
    /// Shrinkage applied to every stage
    pub learning_rate: f64,
    /// Depth of each regression tree
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn without replacement for each stage
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Binomial deviance of raw scores against 0/1 targets
fn log_loss(y: &Array1<f64>, raw: &Array1<f64>) -> f64 {
    let n = y.len().max(1) as f64;
    y.iter()
        .zip(raw.iter())
        .map(|(&t, &f)| (1.0 + f.exp()).ln() - t * f)
        .sum::<f64>()
        / n
}

/// Gradient boosting classifier for two classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    /// Log-odds of the positive class before any stage
    init_raw: f64,
    classes: Vec<f64>,
    /// Training loss after each stage
    train_loss: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            init_raw: 0.0,
            classes: Vec::new(),
            train_loss: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        let config = &self.config;
        if !(config.subsample > 0.0 && config.subsample <= 1.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "subsample".to_string(),
                value: config.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        let classes = sorted_classes(y);
        if classes.len() != 2 {
            return Err(MaintenanceError::TrainingError(format!(
                "gradient boosting needs exactly 2 classes, found {}",
                classes.len()
            )));
        }

        let n_samples = x.nrows();
        let target = y.mapv(|v| if v == classes[1] { 1.0 } else { 0.0 });
        let prior = (target.sum() / n_samples as f64).clamp(1e-15, 1.0 - 1e-15);
        let init_raw = (prior / (1.0 - prior)).ln();

        let mut raw = Array1::from_elem(n_samples, init_raw);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state);
        let n_sub = ((config.subsample * n_samples as f64) as usize).clamp(1, n_samples);
        let mut trees = Vec::with_capacity(config.n_estimators);
        let mut train_loss = Vec::with_capacity(config.n_estimators);

        for stage in 0..config.n_estimators {
            let prob = raw.mapv(sigmoid);
            let residual = &target - &prob;

            let mut rows: Vec<usize> = if n_sub < n_samples {
                rand::seq::index::sample(&mut rng, n_samples, n_sub).into_vec()
            } else {
                (0..n_samples).collect()
            };
            rows.sort_unstable();

            let x_sub = x.select(Axis(0), &rows);
            let r_sub = residual.select(Axis(0), &rows);
            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(config.max_depth)
                .with_min_samples_leaf(config.min_samples_leaf)
                .with_seed(config.random_state.wrapping_add(stage as u64));
            tree.fit(&x_sub, &r_sub)?;

            let leaves = tree.apply(&x_sub)?;
            let mut numerator = vec![0.0; tree.n_leaves()];
            let mut denominator = vec![0.0; tree.n_leaves()];
            for (pos, &row) in rows.iter().enumerate() {
                numerator[leaves[pos]] += residual[row];
                denominator[leaves[pos]] += prob[row] * (1.0 - prob[row]);
            }
            let newton: Vec<f64> = numerator
                .iter()
                .zip(&denominator)
                .map(|(&num, &den)| if den.abs() < 1e-150 { 0.0 } else { num / den })
                .collect();
            tree.set_leaf_values(&newton)?;

            raw = raw + tree.predict(x)? * config.learning_rate;
            train_loss.push(log_loss(&target, &raw));
            trees.push(tree);
        }

        self.trees = trees;
        self.init_raw = init_raw;
        self.classes = classes;
        self.train_loss = train_loss;
        Ok(self)
    }

    /// Log-odds of the positive class
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(MaintenanceError::ModelNotFitted);
        }
        let mut raw = Array1::from_elem(x.nrows(), self.init_raw);
        for tree in &self.trees {
            raw = raw + tree.predict(x)? * self.config.learning_rate;
        }
        Ok(raw)
    }

    /// Probability of the larger class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let (negative, positive) = (self.classes[0], self.classes[1]);
        Ok(proba.mapv(|p| if p > 0.5 { positive } else { negative }))
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::tests::two_blobs;
    use crate::training::accuracy_score;
    use ndarray::array;

    #[test]
    fn test_boosting_fits_blobs() {
        let (x, y) = two_blobs(25);
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert_eq!(accuracy_score(&y, &model.predict(&x).unwrap()), 1.0);
    }

    #[test]
    fn test_training_loss_decreases() {
        let (x, y) = two_blobs(25);
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.7,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let loss = model.train_loss();
        assert_eq!(loss.len(), 10);
        assert!(loss[9] < loss[0]);
    }

    #[test]
    fn test_prior_matches_class_balance() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];
        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let p = model.predict_proba(&x).unwrap();
        assert!((p[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_single_class_and_bad_subsample() {
        let x = array![[0.0], [1.0]];
        assert!(GradientBoostingClassifier::default().fit(&x, &array![1.0, 1.0]).is_err());

        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(&x, &array![0.0, 1.0]),
            Err(MaintenanceError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unfitted() {
        let model = GradientBoostingClassifier::default();
        assert!(matches!(model.predict(&array![[0.0]]), Err(MaintenanceError::ModelNotFitted)));
    }
}
