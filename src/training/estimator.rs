//! Persistable fitted models

use std::path::Path;

use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::preprocessing::{engineer_features, ColumnTransformer};
use crate::schema::SchemaConfig;
use crate::training::adaboost::AdaBoostClassifier;
use crate::training::decision_tree::DecisionTree;
use crate::training::gradient_boosting::GradientBoostingClassifier;
use crate::training::linear_models::LogisticRegression;
use crate::training::random_forest::RandomForestClassifier;
use crate::training::Classifier;
use crate::utils::{load_object, save_object};

/// Any model family the trainer can select, in a serializable form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    RandomForest(RandomForestClassifier),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoostClassifier),
}

impl TrainedClassifier {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::GradientBoosting(m) => m,
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::AdaBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedClassifier::RandomForest(m) => m,
            TrainedClassifier::DecisionTree(m) => m,
            TrainedClassifier::GradientBoosting(m) => m,
            TrainedClassifier::LogisticRegression(m) => m,
            TrainedClassifier::AdaBoost(m) => m,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }
}

impl Classifier for TrainedClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Fitted preprocessor and model behind one `predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceModel {
    preprocessor: ColumnTransformer,
    model: TrainedClassifier,
}

impl MaintenanceModel {
    pub fn new(preprocessor: ColumnTransformer, model: TrainedClassifier) -> Self {
        Self { preprocessor, model }
    }

    pub fn model(&self) -> &TrainedClassifier {
        &self.model
    }

    pub fn preprocessor(&self) -> &ColumnTransformer {
        &self.preprocessor
    }

    /// Predict on already transformed features
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x)
    }

    /// Engineer, transform and predict raw machine readings
    pub fn predict_frame(&self, df: &DataFrame, schema: &SchemaConfig) -> Result<Array1<f64>> {
        let features = engineer_features(df, schema)?;
        let x = self.preprocessor.transform(&features)?;
        self.model.predict(&x)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_object(path)
    }
}
