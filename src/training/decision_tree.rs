//! CART decision trees
//!
//! Splits are found by sorting each candidate feature once per node and
//! sweeping the sorted order, so a node costs `O(n log n)` per feature.
//! Classification trees use Gini or entropy; regression trees (used as
//! gradient boosting stages) use squared error.

use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::training::{check_fit_input, sorted_classes, Classifier};

/// Impurity below which a node is treated as pure
const PURE_NODE_EPSILON: f64 = 1e-12;

/// Split quality criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Shannon entropy (classification)
    Entropy,
    /// Squared error (regression)
    MSE,
}

impl Criterion {
    pub fn is_classification(&self) -> bool {
        !matches!(self, Criterion::MSE)
    }
}

impl FromStr for Criterion {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Criterion::Gini),
            // Same impurity, different name
            "entropy" | "log_loss" => Ok(Criterion::Entropy),
            "squared_error" | "mse" => Ok(Criterion::MSE),
            other => Err(MaintenanceError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected gini, entropy, log_loss or squared_error".to_string(),
            }),
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Position of the leaf in build order
        id: usize,
        /// Class label (classification) or mean target (regression)
        value: f64,
        /// Class proportions, empty for regression
        distribution: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn leaf_for(&self, row: ArrayView1<f64>) -> &TreeNode {
        let mut node = self;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = node
        {
            node = if row[*feature] <= *threshold { left } else { right };
        }
        node
    }

    fn set_leaf_values(&mut self, values: &[f64]) {
        match self {
            TreeNode::Leaf { id, value, .. } => {
                if let Some(&v) = values.get(*id) {
                    *value = v;
                }
            }
            TreeNode::Split { left, right, .. } => {
                left.set_leaf_values(values);
                right.set_leaf_values(values);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Decision tree for classification or regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    criterion: Criterion,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Features drawn per node; all when `None`
    max_features: Option<usize>,
    seed: u64,
    root: Option<TreeNode>,
    classes: Vec<f64>,
    n_features: usize,
    n_leaves: usize,
    feature_importances: Option<Array1<f64>>,
}

impl DecisionTree {
    /// Create a classification tree using Gini impurity
    pub fn new_classifier() -> Self {
        Self::with_criterion_unchecked(Criterion::Gini)
    }

    /// Create a regression tree using squared error
    pub fn new_regressor() -> Self {
        Self::with_criterion_unchecked(Criterion::MSE)
    }

    fn with_criterion_unchecked(criterion: Criterion) -> Self {
        Self {
            criterion,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
            root: None,
            classes: Vec::new(),
            n_features: 0,
            n_leaves: 0,
            feature_importances: None,
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    /// Draw this many candidate features at every node
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Sorted class labels seen during fit
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;

        let targets = if self.criterion.is_classification() {
            self.classes = sorted_classes(y);
            let index = y
                .iter()
                .map(|v| {
                    self.classes
                        .binary_search_by(|c| c.total_cmp(v))
                        .map_err(|_| MaintenanceError::TrainingError(format!("unknown label {}", v)))
                })
                .collect::<Result<Vec<usize>>>()?;
            Targets::Classes {
                index,
                n_classes: self.classes.len(),
            }
        } else {
            self.classes.clear();
            Targets::Values(y.to_vec())
        };

        let n_features = x.ncols();
        let mut builder = Builder {
            x,
            targets,
            classes: &self.classes,
            criterion: self.criterion,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.map_or(n_features, |m| m.min(n_features)),
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            n_leaves: 0,
            importances: vec![0.0; n_features],
        };
        let root = builder.build((0..x.nrows()).collect(), 0);

        let total: f64 = builder.importances.iter().sum();
        let importances = if total > 0.0 {
            builder.importances.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; n_features]
        };

        self.n_leaves = builder.n_leaves;
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(importances));
        self.root = Some(root);
        Ok(self)
    }

    fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(MaintenanceError::ModelNotFitted)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Predicted class label or regression value per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        self.check_width(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match root.leaf_for(row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => f64::NAN,
            })
            .collect())
    }

    /// Class proportions of the reached leaf, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root()?;
        self.check_width(x)?;
        if !self.criterion.is_classification() {
            return Err(MaintenanceError::TrainingError(
                "probabilities are only defined for classification trees".to_string(),
            ));
        }
        let k = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), k));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = root.leaf_for(row) {
                for (j, p) in distribution.iter().enumerate() {
                    proba[[i, j]] = *p;
                }
            }
        }
        Ok(proba)
    }

    /// Leaf id reached by every row
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.root()?;
        self.check_width(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match root.leaf_for(row) {
                TreeNode::Leaf { id, .. } => *id,
                TreeNode::Split { .. } => 0,
            })
            .collect())
    }

    /// Overwrite leaf outputs, indexed by leaf id
    pub fn set_leaf_values(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.n_leaves {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} leaf values", self.n_leaves),
                actual: format!("{} leaf values", values.len()),
            });
        }
        let root = self.root.as_mut().ok_or(MaintenanceError::ModelNotFitted)?;
        root.set_leaf_values(values);
        Ok(())
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

enum Targets {
    Classes { index: Vec<usize>, n_classes: usize },
    Values(Vec<f64>),
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    impurity_left: f64,
    impurity_right: f64,
    /// Rows going left, in ascending feature order
    n_left: usize,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    targets: Targets,
    classes: &'a [f64],
    criterion: Criterion,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
    rng: ChaCha8Rng,
    n_leaves: usize,
    importances: Vec<f64>,
}

fn class_impurity(criterion: Criterion, counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    match criterion {
        Criterion::Entropy => counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.log2()
            })
            .sum(),
        _ => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
    }
}

fn variance(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let mean = sum / n as f64;
    (sum_sq / n as f64 - mean * mean).max(0.0)
}

impl<'a> Builder<'a> {
    fn node_impurity(&self, indices: &[usize]) -> f64 {
        match &self.targets {
            Targets::Classes { index, n_classes } => {
                let mut counts = vec![0usize; *n_classes];
                for &i in indices {
                    counts[index[i]] += 1;
                }
                class_impurity(self.criterion, &counts, indices.len())
            }
            Targets::Values(values) => {
                let (sum, sum_sq) = indices
                    .iter()
                    .fold((0.0, 0.0), |(s, sq), &i| (s + values[i], sq + values[i] * values[i]));
                variance(sum, sum_sq, indices.len())
            }
        }
    }

    fn make_leaf(&mut self, indices: &[usize]) -> TreeNode {
        let id = self.n_leaves;
        self.n_leaves += 1;
        let n = indices.len();
        match &self.targets {
            Targets::Classes { index, n_classes } => {
                let mut counts = vec![0usize; *n_classes];
                for &i in indices {
                    counts[index[i]] += 1;
                }
                // Ties go to the lowest class
                let best = counts
                    .iter()
                    .enumerate()
                    .fold(0, |best, (j, &c)| if c > counts[best] { j } else { best });
                TreeNode::Leaf {
                    id,
                    value: self.classes.get(best).copied().unwrap_or(0.0),
                    distribution: counts.iter().map(|&c| c as f64 / n.max(1) as f64).collect(),
                    n_samples: n,
                }
            }
            Targets::Values(values) => TreeNode::Leaf {
                id,
                value: indices.iter().map(|&i| values[i]).sum::<f64>() / n.max(1) as f64,
                distribution: Vec::new(),
                n_samples: n,
            },
        }
    }

    fn build(&mut self, mut indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let impurity = self.node_impurity(&indices);
        let splittable = n >= self.min_samples_split
            && n >= 2 * self.min_samples_leaf
            && self.max_depth.map_or(true, |d| depth < d)
            && impurity > PURE_NODE_EPSILON;

        if splittable {
            if let Some(split) = self.best_split(&indices, impurity) {
                let f = split.feature;
                indices.sort_by(|&a, &b| self.x[[a, f]].total_cmp(&self.x[[b, f]]));
                let right_indices = indices.split_off(split.n_left);
                let n_left = indices.len() as f64;
                let n_right = right_indices.len() as f64;
                self.importances[f] +=
                    n as f64 * impurity - n_left * split.impurity_left - n_right * split.impurity_right;

                let left = self.build(indices, depth + 1);
                let right = self.build(right_indices, depth + 1);
                return TreeNode::Split {
                    feature: f,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                    n_samples: n,
                };
            }
        }
        self.make_leaf(&indices)
    }

    /// Best split over a random feature subset; falls back to the remaining
    /// features when none of the drawn ones can split the node
    fn best_split(&mut self, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let mut order: Vec<usize> = (0..n_features).collect();
        if self.max_features < n_features {
            order.shuffle(&mut self.rng);
        }
        let (drawn, rest) = order.split_at(self.max_features);

        let best = self.best_among(drawn, indices, parent_impurity);
        if best.is_some() || rest.is_empty() {
            return best;
        }
        self.best_among(rest, indices, parent_impurity)
    }

    fn best_among(&self, features: &[usize], indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let candidates: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&f| self.sweep_feature(f, indices, parent_impurity))
            .collect();
        // Ties go to the feature evaluated first
        candidates.into_iter().flatten().fold(None, |best, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    fn sweep_feature(&self, feature: usize, indices: &[usize], parent_impurity: f64) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
        let value = |pos: usize| self.x[[sorted[pos], feature]];

        let mut best: Option<SplitCandidate> = None;
        let mut consider = |pos: usize, impurity_left: f64, impurity_right: f64| {
            let n_left = pos + 1;
            let n_right = n - n_left;
            let gain = parent_impurity
                - (n_left as f64 / n as f64) * impurity_left
                - (n_right as f64 / n as f64) * impurity_right;
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                let mut threshold = (value(pos) + value(pos + 1)) / 2.0;
                // Midpoint can round up to the right value
                if threshold >= value(pos + 1) {
                    threshold = value(pos);
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    gain,
                    impurity_left,
                    impurity_right,
                    n_left,
                });
            }
        };

        let valid = |pos: usize| {
            let n_left = pos + 1;
            value(pos + 1) > value(pos)
                && n_left >= self.min_samples_leaf
                && n - n_left >= self.min_samples_leaf
        };

        match &self.targets {
            Targets::Classes { index, n_classes } => {
                let mut total = vec![0usize; *n_classes];
                for &i in &sorted {
                    total[index[i]] += 1;
                }
                let mut left = vec![0usize; *n_classes];
                let mut right = total;
                for pos in 0..n - 1 {
                    let class = index[sorted[pos]];
                    left[class] += 1;
                    right[class] -= 1;
                    if valid(pos) {
                        let il = class_impurity(self.criterion, &left, pos + 1);
                        let ir = class_impurity(self.criterion, &right, n - pos - 1);
                        consider(pos, il, ir);
                    }
                }
            }
            Targets::Values(values) => {
                let (total_sum, total_sq) = sorted
                    .iter()
                    .fold((0.0, 0.0), |(s, sq), &i| (s + values[i], sq + values[i] * values[i]));
                let (mut sum, mut sq) = (0.0, 0.0);
                for pos in 0..n - 1 {
                    let v = values[sorted[pos]];
                    sum += v;
                    sq += v * v;
                    if valid(pos) {
                        let il = variance(sum, sq, pos + 1);
                        let ir = variance(total_sum - sum, total_sq - sq, n - pos - 1);
                        consider(pos, il, ir);
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [10.0, 0.0], [11.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.n_leaves(), 2);
        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_midpoint() {
        let x = array![[1.0], [3.0]];
        let y = array![0.0, 1.0];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[1.9], [2.1]]).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn test_entropy_fits_xor() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];
        let mut tree = DecisionTree::new_classifier().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[4, 2]);
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-12);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_regressor_and_leaf_update() {
        let x = array![[1.0], [2.0], [8.0], [9.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);

        let leaves = tree.apply(&x).unwrap();
        assert_eq!(leaves, vec![0, 0, 1, 1]);
        tree.set_leaf_values(&[-1.0, 2.0]).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), array![-1.0, -1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_criterion_parsing() {
        assert_eq!("log_loss".parse::<Criterion>().unwrap(), Criterion::Entropy);
        assert!("hinge".parse::<Criterion>().is_err());
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(MaintenanceError::ModelNotFitted)
        ));

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&array![[1.0], [2.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0, 2.0]]),
            Err(MaintenanceError::ShapeError { .. })
        ));
    }
}
