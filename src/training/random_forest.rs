//! Random forest classifier

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::training::decision_tree::{Criterion, DecisionTree};
use crate::training::{check_fit_input, sorted_classes, Classifier};

/// Number of features drawn at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    /// Fraction of features
    Fraction(f64),
    Fixed(usize),
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
            MaxFeatures::Fixed(n) => *n,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Bagged ensemble of decision trees, each grown on a bootstrap sample with
/// random feature subsets at every node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_estimators: usize,
    criterion: Criterion,
    max_depth: Option<usize>,
    max_features: MaxFeatures,
    bootstrap: bool,
    seed: u64,
    trees: Vec<DecisionTree>,
    classes: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
            trees: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let max_features = self.max_features.resolve(x.ncols());

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let tree_seed = self.seed.wrapping_add(i as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);
                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_seed(rng.gen());
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }

                if self.bootstrap {
                    let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let xs = x.select(Axis(0), &sample);
                    let ys = y.select(Axis(0), &sample);
                    tree.fit(&xs, &ys)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.classes = sorted_classes(y);
        self.trees = trees;
        Ok(self)
    }

    /// Mean of the trees' class proportions, columns ordered by class label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(MaintenanceError::ModelNotFitted);
        }
        let k = self.classes.len();
        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| {
                let proba = tree.predict_proba(x)?;
                // A bootstrap sample may miss a class; map onto the forest's columns
                let mut aligned = Array2::<f64>::zeros((x.nrows(), k));
                for (j, class) in tree.classes().iter().enumerate() {
                    if let Ok(col) = self.classes.binary_search_by(|c| c.total_cmp(class)) {
                        aligned.column_mut(col).assign(&proba.column(j));
                    }
                }
                Ok(aligned)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut total = Array2::<f64>::zeros((x.nrows(), k));
        for proba in per_tree {
            total += &proba;
        }
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold(0, |best, (j, &p)| if p > row[best] { j } else { best });
                self.classes[best]
            })
            .collect())
    }

    /// Mean impurity importance across trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let importances: Vec<&Array1<f64>> = self.trees.iter().filter_map(|t| t.feature_importances()).collect();
        let first = importances.first()?;
        let mut total = Array1::zeros(first.len());
        for imp in &importances {
            total += *imp;
        }
        Some(total / importances.len() as f64)
    }
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestClassifier::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
