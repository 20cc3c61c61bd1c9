//! Edited nearest neighbours cleaning

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MaintenanceError, Result};
use crate::synthetic::{class_counts, minority_class, nearest_neighbors, ResampleResult, Sampler};

/// Classes the cleaning step may remove samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningScope {
    /// Every class except the minority
    Majority,
    /// Every class
    All,
}

/// Removes samples whose nearest neighbours include another class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditedNearestNeighbours {
    n_neighbors: usize,
    scope: CleaningScope,
    /// Class exempt from cleaning under [`CleaningScope::Majority`]
    protected_class: Option<i64>,
    /// Set when the protected class was given explicitly; `fit` keeps it
    #[serde(default)]
    pinned: bool,
}

impl EditedNearestNeighbours {
    pub fn new() -> Self {
        Self {
            n_neighbors: 3,
            scope: CleaningScope::Majority,
            protected_class: None,
            pinned: false,
        }
    }

    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k.max(1);
        self
    }

    pub fn with_scope(mut self, scope: CleaningScope) -> Self {
        self.scope = scope;
        self
    }

    /// Exempt `class` from cleaning instead of the minority seen by `fit`
    ///
    /// Needed when the labels being cleaned were already balanced by
    /// oversampling and no longer show which class was the minority.
    pub fn with_protected_class(mut self, class: Option<i64>) -> Self {
        self.protected_class = class;
        self.pinned = true;
        self
    }

    pub fn scope(&self) -> CleaningScope {
        self.scope
    }

    pub fn protected_class(&self) -> Option<i64> {
        self.protected_class
    }
}

impl Default for EditedNearestNeighbours {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for EditedNearestNeighbours {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        self.protected_class = match self.scope {
            CleaningScope::Majority => minority_class(&class_counts(y)),
            CleaningScope::All => None,
        };
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        if x.nrows() != y.len() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.nrows() <= self.n_neighbors {
            return Ok(ResampleResult {
                x: x.clone(),
                y: y.clone(),
                n_synthetic: 0,
                n_removed: 0,
            });
        }

        let keep: Vec<usize> = (0..x.nrows())
            .into_par_iter()
            .filter(|&i| {
                if Some(y[i]) == self.protected_class {
                    return true;
                }
                nearest_neighbors(x.row(i), x, self.n_neighbors, Some(i))
                    .into_iter()
                    .all(|j| y[j] == y[i])
            })
            .collect();

        Ok(ResampleResult {
            x: x.select(Axis(0), &keep),
            y: y.select(Axis(0), &keep),
            n_synthetic: 0,
            n_removed: x.nrows() - keep.len(),
        })
    }
}
