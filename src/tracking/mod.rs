//! Experiment tracking
//!
//! Each run lives in `<base>/<experiment>/<run_id>/` with a `meta.json`
//! describing params, metrics and status next to any logged artifacts.

mod storage;

pub use storage::LocalTracker;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// A single tracked run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact file names relative to the run directory
    pub artifacts: Vec<String>,
}

impl Run {
    pub fn new(experiment: &str, run_name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.to_string(),
            experiment: experiment.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) {
        self.params.insert(key.to_string(), value.to_string());
    }

    pub fn log_metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }
}

/// Destination for run metadata and artifacts
pub trait ExperimentTracker: Send + Sync {
    /// Open a run and persist it as running
    fn start_run(&self, run_name: &str) -> Result<Run>;

    /// Store `bytes` as a named artifact of `run`
    fn log_artifact(&self, run: &mut Run, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Close the run with a final status, persisting params and metrics
    fn end_run(&self, run: &mut Run, status: RunStatus) -> Result<()>;

    /// All runs of the experiment, oldest first
    fn list_runs(&self) -> Result<Vec<Run>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logging() {
        let mut run = Run::new("maintenance", "train");
        run.log_param("model", "Decision Tree");
        run.log_metric("f1_score", 0.9);
        run.log_metric("f1_score", 0.95);

        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.params["model"], "Decision Tree");
        assert_eq!(run.metrics["f1_score"], 0.95);
        assert_eq!(run.run_id.len(), 32);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Finished).unwrap(), "\"finished\"");
    }
}
