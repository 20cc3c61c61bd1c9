//! Model families and their search grids

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::training::adaboost::AdaBoostClassifier;
use crate::training::decision_tree::{Criterion, DecisionTree};
use crate::training::estimator::TrainedClassifier;
use crate::training::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use crate::training::grid_search::{ParamGrid, ParamSet, ParamValue};
use crate::training::linear_models::LogisticRegression;
use crate::training::random_forest::RandomForestClassifier;

/// Model families the trainer knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    DecisionTree,
    GradientBoosting,
    LogisticRegression,
    AdaBoost,
}

fn unknown_param(family: ModelFamily, name: &str, value: &ParamValue) -> MaintenanceError {
    MaintenanceError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("not a parameter of {}", family),
    }
}

impl ModelFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::LogisticRegression => "Logistic Regression",
            ModelFamily::AdaBoost => "AdaBoost",
        }
    }

    /// Unfitted model with `params` applied over the family defaults
    pub fn build(&self, params: &ParamSet, seed: u64) -> Result<TrainedClassifier> {
        let family = *self;
        match family {
            ModelFamily::RandomForest => {
                let mut model = RandomForestClassifier::new().with_seed(seed);
                for (name, value) in params {
                    model = match name.as_str() {
                        "n_estimators" => model.with_n_estimators(value.as_usize(name)?),
                        "criterion" => model.with_criterion(value.as_str(name)?.parse()?),
                        "max_depth" => model.with_max_depth(value.as_usize(name)?),
                        _ => return Err(unknown_param(family, name, value)),
                    };
                }
                Ok(TrainedClassifier::RandomForest(model))
            }
            ModelFamily::DecisionTree => {
                let mut model = DecisionTree::new_classifier().with_seed(seed);
                for (name, value) in params {
                    model = match name.as_str() {
                        "criterion" => {
                            let criterion: Criterion = value.as_str(name)?.parse()?;
                            if !criterion.is_classification() {
                                return Err(MaintenanceError::InvalidParameter {
                                    name: name.clone(),
                                    value: value.to_string(),
                                    reason: "classification trees need gini or entropy".to_string(),
                                });
                            }
                            model.with_criterion(criterion)
                        }
                        "max_depth" => model.with_max_depth(value.as_usize(name)?),
                        "min_samples_leaf" => model.with_min_samples_leaf(value.as_usize(name)?),
                        _ => return Err(unknown_param(family, name, value)),
                    };
                }
                Ok(TrainedClassifier::DecisionTree(model))
            }
            ModelFamily::GradientBoosting => {
                let mut config = GradientBoostingConfig {
                    random_state: seed,
                    ..Default::default()
                };
                for (name, value) in params {
                    match name.as_str() {
                        "learning_rate" => config.learning_rate = value.as_f64(name)?,
                        "subsample" => config.subsample = value.as_f64(name)?,
                        "n_estimators" => config.n_estimators = value.as_usize(name)?,
                        "max_depth" => config.max_depth = value.as_usize(name)?,
                        _ => return Err(unknown_param(family, name, value)),
                    }
                }
                Ok(TrainedClassifier::GradientBoosting(GradientBoostingClassifier::new(config)))
            }
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new();
                for (name, value) in params {
                    model = match name.as_str() {
                        "C" => model.with_c(value.as_f64(name)?),
                        "max_iter" => model.with_max_iter(value.as_usize(name)?),
                        _ => return Err(unknown_param(family, name, value)),
                    };
                }
                Ok(TrainedClassifier::LogisticRegression(model))
            }
            ModelFamily::AdaBoost => {
                let mut model = AdaBoostClassifier::default();
                for (name, value) in params {
                    model = match name.as_str() {
                        "learning_rate" => model.with_learning_rate(value.as_f64(name)?),
                        "n_estimators" => model.with_n_estimators(value.as_usize(name)?),
                        _ => return Err(unknown_param(family, name, value)),
                    };
                }
                Ok(TrainedClassifier::AdaBoost(model))
            }
        }
    }

    /// Search grid evaluated by the default roster
    pub fn default_grid(&self) -> ParamGrid {
        match self {
            ModelFamily::RandomForest => ParamGrid::new().with_param("n_estimators", [8i64, 16, 32, 128, 256]),
            ModelFamily::DecisionTree => {
                ParamGrid::new().with_param("criterion", ["gini", "entropy", "log_loss"])
            }
            ModelFamily::GradientBoosting => ParamGrid::new()
                .with_param("learning_rate", [0.1, 0.01, 0.05, 0.001])
                .with_param("subsample", [0.6, 0.7, 0.75, 0.85, 0.9])
                .with_param("n_estimators", [8i64, 16, 32, 64, 128, 256]),
            ModelFamily::LogisticRegression => ParamGrid::new(),
            ModelFamily::AdaBoost => ParamGrid::new()
                .with_param("learning_rate", [0.1, 0.01, 0.001])
                .with_param("n_estimators", [8i64, 16, 32, 64, 128, 256]),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A family and the grid searched for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub family: ModelFamily,
    pub grid: ParamGrid,
}

/// Ordered roster of families to evaluate
///
/// Order matters: equal held-out scores are resolved in favour of the
/// earlier entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl ModelRegistry {
    /// Empty roster
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Random Forest, Decision Tree, Gradient Boosting, Logistic Regression
    /// and AdaBoost with their default grids
    pub fn default_roster() -> Self {
        [
            ModelFamily::RandomForest,
            ModelFamily::DecisionTree,
            ModelFamily::GradientBoosting,
            ModelFamily::LogisticRegression,
            ModelFamily::AdaBoost,
        ]
        .into_iter()
        .fold(Self::new(), |registry, family| registry.with_model(family, family.default_grid()))
    }

    /// Append a family, replacing its grid if already present
    pub fn with_model(mut self, family: ModelFamily, grid: ParamGrid) -> Self {
        match self.entries.iter_mut().find(|e| e.family == family) {
            Some(entry) => entry.grid = grid,
            None => self.entries.push(RegistryEntry { family, grid }),
        }
        self
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.family.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::default_roster()
    }
}
