//! Model training
//!
//! Classifier families searched by the trainer:
//! - Decision trees and random forests
//! - Gradient boosting
//! - Logistic regression
//! - AdaBoost
//!
//! [`ModelTrainer`] grid-searches each family of a [`ModelRegistry`] with
//! stratified cross-validation, ranks the refit winners on the test split and
//! persists the best one.

pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
mod estimator;
pub mod gradient_boosting;
mod grid_search;
pub mod linear_models;
mod metrics;
pub mod random_forest;
mod registry;
mod trainer;

pub use adaboost::AdaBoostClassifier;
pub use cross_validation::{CVResults, CVSplit, StratifiedKFold};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use estimator::{MaintenanceModel, TrainedClassifier};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{GridSearchCV, GridSearchResult, ParamGrid, ParamSet, ParamValue};
pub use linear_models::LogisticRegression;
pub use metrics::{
    accuracy_score, classification_score, f1_score, precision_score, r2_score, recall_score, SelectionMetric,
};
pub use random_forest::{MaxFeatures, RandomForestClassifier};
pub use registry::{ModelFamily, ModelRegistry, RegistryEntry};
pub use trainer::{evaluate_models, select_best, EvaluationSettings, ModelEvaluation, ModelReport, ModelTrainer};

use ndarray::{Array1, Array2};

use crate::error::{MaintenanceError, Result};

/// A model that learns class labels from a feature matrix
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predicted class label per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// Reject empty inputs, mismatched lengths and non-finite values
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MaintenanceError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(MaintenanceError::TrainingError(format!(
            "cannot fit on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(MaintenanceError::TrainingError(
            "training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Distinct labels in ascending order
pub(crate) fn sorted_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes = y.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    classes
}
