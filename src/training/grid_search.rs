//! Exhaustive hyperparameter search with stratified cross-validation

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MaintenanceError, Result};
use crate::training::cross_validation::{CVResults, StratifiedKFold};
use crate::training::metrics::accuracy_score;
use crate::training::Classifier;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(v) => Ok(*v as f64),
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Text(_) => Err(self.invalid(name, "expected a number")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(self.invalid(name, "expected a non-negative integer")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(s) => Ok(s),
            _ => Err(self.invalid(name, "expected a string")),
        }
    }

    fn invalid(&self, name: &str, reason: &str) -> MaintenanceError {
        MaintenanceError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One point of a grid, keyed by parameter name
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Candidate values per parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.params
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product over parameters in name order, last name varying
    /// fastest; an empty grid yields one empty set
    pub fn candidates(&self) -> Vec<ParamSet> {
        let mut sets = vec![ParamSet::new()];
        for (name, values) in &self.params {
            sets = sets
                .into_iter()
                .flat_map(|set| {
                    values.iter().map(move |v| {
                        let mut next = set.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        sets
    }
}

/// Outcome of a grid search
#[derive(Debug, Clone)]
pub struct GridSearchResult<C> {
    pub best_params: ParamSet,
    /// Mean CV accuracy of the best candidate
    pub best_score: f64,
    /// Best candidate refit on all rows
    pub best_estimator: C,
    /// Every candidate with its fold scores, in grid order
    pub cv_results: Vec<(ParamSet, CVResults)>,
}

/// Grid search scored by mean fold accuracy
#[derive(Debug, Clone, Copy)]
pub struct GridSearchCV {
    folds: StratifiedKFold,
}

impl GridSearchCV {
    pub fn new(n_splits: usize) -> Result<Self> {
        Ok(Self {
            folds: StratifiedKFold::new(n_splits)?,
        })
    }

    /// Evaluate every candidate built by `build`, then refit the best on all
    /// of `x`; ties go to the earlier candidate
    pub fn fit<C, F>(&self, build: F, grid: &ParamGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult<C>>
    where
        C: Classifier,
        F: Fn(&ParamSet) -> Result<C> + Sync,
    {
        if grid.is_empty() {
            return Err(MaintenanceError::InvalidParameter {
                name: "param_grid".to_string(),
                value: "[]".to_string(),
                reason: "every parameter needs at least one value".to_string(),
            });
        }
        let splits = self.folds.split(y)?;
        let candidates = grid.candidates();

        let cv_results = candidates
            .into_par_iter()
            .map(|params| {
                let scores = splits
                    .iter()
                    .map(|split| {
                        let mut model = build(&params)?;
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        model.fit(&x_train, &y_train)?;
                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(Axis(0), &split.test_indices);
                        Ok(accuracy_score(&y_test, &model.predict(&x_test)?))
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok((params, CVResults::from_scores(scores)))
            })
            .collect::<Result<Vec<_>>>()?;

        let best = cv_results
            .iter()
            .enumerate()
            .fold(0, |best, (i, (_, r))| if r.mean_score > cv_results[best].1.mean_score { i } else { best });
        let (best_params, best_cv) = &cv_results[best];
        debug!(params = ?best_params, score = best_cv.mean_score, "Best grid candidate");

        let mut best_estimator = build(best_params)?;
        best_estimator.fit(x, y)?;

        Ok(GridSearchResult {
            best_params: best_params.clone(),
            best_score: best_cv.mean_score,
            best_estimator,
            cv_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::decision_tree::DecisionTree;
    use crate::training::tests::two_blobs;

    #[test]
    fn test_grid_candidates_order() {
        let grid = ParamGrid::new()
            .with_param("n_estimators", [8i64, 16])
            .with_param("learning_rate", [0.1, 0.01]);
        let candidates = grid.candidates();

        assert_eq!(grid.len(), 4);
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0]["learning_rate"], ParamValue::Float(0.1));
        assert_eq!(candidates[0]["n_estimators"], ParamValue::Int(8));
        assert_eq!(candidates[1]["n_estimators"], ParamValue::Int(16));
        assert_eq!(candidates[2]["learning_rate"], ParamValue::Float(0.01));
    }

    #[test]
    fn test_empty_grid_has_one_candidate() {
        let grid = ParamGrid::new();
        assert_eq!(grid.candidates(), vec![ParamSet::new()]);
        assert!(!grid.is_empty());
    }

    #[test]
    fn test_param_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_usize("n").unwrap(), 3);
        assert_eq!(ParamValue::Int(3).as_f64("n").unwrap(), 3.0);
        assert!(ParamValue::Float(0.5).as_usize("n").is_err());
        assert_eq!(ParamValue::from("gini").as_str("criterion").unwrap(), "gini");
        assert!(ParamValue::Int(-1).as_usize("n").is_err());
    }

    #[test]
    fn test_grid_search_picks_working_candidate() {
        let (x, y) = two_blobs(20);
        let grid = ParamGrid::new().with_param("max_depth", [0i64, 2]);
        let search = GridSearchCV::new(5).unwrap();
        let result = search
            .fit(
                |params| {
                    let depth = params["max_depth"].as_usize("max_depth")?;
                    Ok(DecisionTree::new_classifier().with_max_depth(depth))
                },
                &grid,
                &x,
                &y,
            )
            .unwrap();

        assert_eq!(result.best_params["max_depth"], ParamValue::Int(2));
        assert_eq!(result.best_score, 1.0);
        assert_eq!(result.cv_results.len(), 2);
        assert!((result.cv_results[0].1.mean_score - 0.5).abs() < 1e-12);
        assert!(result.best_estimator.is_fitted());
    }
}
