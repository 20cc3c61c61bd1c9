//! Model training stage

use std::time::Instant;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact::{ClassificationMetricArtifact, DataTransformationArtifact, ModelTrainerArtifact};
use crate::config::ModelTrainerConfig;
use crate::error::{MaintenanceError, Result};
use crate::preprocessing::ColumnTransformer;
use crate::tracking::{ExperimentTracker, LocalTracker, RunStatus};
use crate::training::estimator::{MaintenanceModel, TrainedClassifier};
use crate::training::grid_search::{GridSearchCV, ParamSet};
use crate::training::metrics::{classification_score, SelectionMetric};
use crate::training::registry::{ModelFamily, ModelRegistry};
use crate::training::Classifier;
use crate::transformation::split_label;
use crate::utils::load_array;

/// How candidates are searched and ranked
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Held-out metric used to rank families
    pub metric: SelectionMetric,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            metric: SelectionMetric::default(),
            cv_folds: 5,
            seed: 42,
        }
    }
}

/// Best candidate of one family
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    pub family: ModelFamily,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the chosen parameters
    pub cv_score: f64,
    /// Held-out score under the selection metric
    pub test_score: f64,
    /// Refit on all training rows
    pub model: TrainedClassifier,
}

/// Per-family results in roster order
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub metric: SelectionMetric,
    pub evaluations: Vec<ModelEvaluation>,
}

impl ModelReport {
    /// Held-out score per family name
    pub fn scores(&self) -> Vec<(&'static str, f64)> {
        self.evaluations.iter().map(|e| (e.family.name(), e.test_score)).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ModelEvaluation> {
        self.evaluations.iter().find(|e| e.family.name() == name)
    }
}

/// Grid-search every family of the registry and score its refit winner on the test split
pub fn evaluate_models(
    registry: &ModelRegistry,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    settings: &EvaluationSettings,
) -> Result<ModelReport> {
    let search = GridSearchCV::new(settings.cv_folds)?;
    let mut evaluations = Vec::with_capacity(registry.len());

    for entry in registry.entries() {
        let started = Instant::now();
        let family = entry.family;
        let result = search.fit(|params| family.build(params, settings.seed), &entry.grid, x_train, y_train)?;
        let test_score = settings.metric.score(y_test, &result.best_estimator.predict(x_test)?);
        info!(
            model = family.name(),
            candidates = entry.grid.len(),
            params = ?result.best_params,
            cv_accuracy = result.best_score,
            test_score,
            metric = %settings.metric,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluated model family"
        );
        evaluations.push(ModelEvaluation {
            family,
            best_params: result.best_params,
            cv_score: result.best_score,
            test_score,
            model: result.best_estimator,
        });
    }

    Ok(ModelReport {
        metric: settings.metric,
        evaluations,
    })
}

/// Highest held-out score; ties go to the earlier roster entry and NaN never wins
pub fn select_best(report: &ModelReport) -> Result<&ModelEvaluation> {
    let rank = |score: f64| if score.is_nan() { f64::NEG_INFINITY } else { score };
    report
        .evaluations
        .iter()
        .fold(None, |best: Option<&ModelEvaluation>, e| match best {
            Some(b) if rank(b.test_score) >= rank(e.test_score) => Some(b),
            _ => Some(e),
        })
        .ok_or_else(|| MaintenanceError::TrainingError("no model families were evaluated".to_string()))
}

pub struct ModelTrainer {
    transformation_artifact: DataTransformationArtifact,
    config: ModelTrainerConfig,
    registry: ModelRegistry,
    tracker: Box<dyn ExperimentTracker>,
}

impl ModelTrainer {
    pub fn new(transformation_artifact: DataTransformationArtifact, config: ModelTrainerConfig) -> Self {
        let tracker = LocalTracker::new(&config.tracking_dir, config.experiment_name.clone());
        Self {
            transformation_artifact,
            config,
            registry: ModelRegistry::default_roster(),
            tracker: Box::new(tracker),
        }
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    fn settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            metric: self.config.selection_metric,
            cv_folds: self.config.cv_folds,
            seed: self.config.random_seed,
        }
    }

    /// Record metrics and the model blob in a run of their own
    fn track(&self, split: &str, best: &ModelEvaluation, metric: &ClassificationMetricArtifact) -> Result<String> {
        let mut run = self.tracker.start_run(split)?;
        run.log_param("model", best.family.name());
        for (name, value) in &best.best_params {
            run.log_param(name, value);
        }
        run.log_metric("f1_score", metric.f1_score);
        run.log_metric("precision", metric.precision_score);
        run.log_metric("recall_score", metric.recall_score);

        let logged = bincode::serialize(&best.model)
            .map_err(MaintenanceError::from)
            .and_then(|bytes| self.tracker.log_artifact(&mut run, "model.bin", &bytes));
        let status = if logged.is_ok() { RunStatus::Finished } else { RunStatus::Failed };
        self.tracker.end_run(&mut run, status)?;
        logged.map(|_| run.run_id)
    }

    fn track_or_warn(&self, split: &str, best: &ModelEvaluation, metric: &ClassificationMetricArtifact) {
        match self.track(split, best, metric) {
            Ok(run_id) => info!(split, run_id = %run_id, "Tracked model run"),
            Err(e) => warn!(split, error = %e, "Experiment tracking failed"),
        }
    }

    fn load_split(path: &std::path::Path) -> Result<(Array2<f64>, Array1<f64>)> {
        let (x, y) = split_label(&load_array(path)?)?;
        Ok((x, y.mapv(|v| v as f64)))
    }

    pub fn initiate_model_trainer(&self) -> Result<ModelTrainerArtifact> {
        info!("Starting model training");
        let (x_train, y_train) = Self::load_split(&self.transformation_artifact.transformed_train_file_path)?;
        let (x_test, y_test) = Self::load_split(&self.transformation_artifact.transformed_test_file_path)?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            "Loaded transformed arrays"
        );

        let report = evaluate_models(&self.registry, &x_train, &y_train, &x_test, &y_test, &self.settings())?;
        let best = select_best(&report)?;
        info!(
            model = best.family.name(),
            score = best.test_score,
            metric = %report.metric,
            "Selected best model"
        );

        let train_metric = classification_score(&y_train, &best.model.predict(&x_train)?);
        self.track_or_warn("train", best, &train_metric);
        let test_metric = classification_score(&y_test, &best.model.predict(&x_test)?);
        self.track_or_warn("test", best, &test_metric);

        let preprocessor = ColumnTransformer::load(&self.transformation_artifact.transformed_object_file_path)?;
        MaintenanceModel::new(preprocessor, best.model.clone()).save(&self.config.trained_model_file_path)?;
        best.model.save(&self.config.final_model_file_path)?;
        info!(
            trained_model = %self.config.trained_model_file_path.display(),
            final_model = %self.config.final_model_file_path.display(),
            train_f1 = train_metric.f1_score,
            test_f1 = test_metric.f1_score,
            "Finished model training"
        );

        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            train_metric_artifact: train_metric,
            test_metric_artifact: test_metric,
            best_model_name: best.family.name().to_string(),
            best_model_score: best.test_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::grid_search::ParamGrid;
    use crate::training::tests::two_blobs;

    fn evaluation(family: ModelFamily, test_score: f64) -> ModelEvaluation {
        ModelEvaluation {
            family,
            best_params: ParamSet::new(),
            cv_score: 0.0,
            test_score,
            model: TrainedClassifier::DecisionTree(Default::default()),
        }
    }

    #[test]
    fn test_select_best_prefers_earlier_on_tie() {
        let report = ModelReport {
            metric: SelectionMetric::R2,
            evaluations: vec![
                evaluation(ModelFamily::RandomForest, 0.9),
                evaluation(ModelFamily::DecisionTree, 0.95),
                evaluation(ModelFamily::AdaBoost, 0.95),
                evaluation(ModelFamily::LogisticRegression, f64::NAN),
            ],
        };
        assert_eq!(select_best(&report).unwrap().family, ModelFamily::DecisionTree);
    }

    #[test]
    fn test_select_best_empty_report() {
        let report = ModelReport {
            metric: SelectionMetric::F1,
            evaluations: Vec::new(),
        };
        assert!(select_best(&report).is_err());
    }

    #[test]
    fn test_evaluate_models_small_roster() {
        let (x, y) = two_blobs(20);
        let registry = ModelRegistry::new()
            .with_model(ModelFamily::DecisionTree, ModelFamily::DecisionTree.default_grid())
            .with_model(
                ModelFamily::AdaBoost,
                ParamGrid::new().with_param("n_estimators", [4i64]),
            );
        let report = evaluate_models(&registry, &x, &y, &x, &y, &EvaluationSettings::default()).unwrap();

        assert_eq!(report.evaluations.len(), 2);
        assert_eq!(report.scores()[0], ("Decision Tree", 1.0));
        // Both score 1.0, the tree is listed first
        assert_eq!(select_best(&report).unwrap().family, ModelFamily::DecisionTree);
        assert_eq!(
            report.get("Decision Tree").unwrap().best_params["criterion"],
            crate::training::ParamValue::from("gini")
        );
    }
}
