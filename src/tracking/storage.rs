//! Local file system tracker

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::{ExperimentTracker, Run, RunStatus};
use crate::error::{MaintenanceError, Result};

const META_FILE_NAME: &str = "meta.json";

/// Tracker writing runs below a local directory
#[derive(Debug, Clone)]
pub struct LocalTracker {
    base_dir: PathBuf,
    experiment: String,
}

impl LocalTracker {
    pub fn new(base_dir: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            experiment: experiment.into(),
        }
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.base_dir.join(&self.experiment)
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.experiment_dir().join(run_id)
    }

    fn write_meta(&self, run: &Run) -> Result<()> {
        let dir = self.run_dir(&run.run_id);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(run)?;
        fs::write(dir.join(META_FILE_NAME), json)?;
        Ok(())
    }

    fn read_meta(path: &Path) -> Result<Run> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| MaintenanceError::TrackingError(format!("{}: {}", path.display(), e)))
    }
}

impl ExperimentTracker for LocalTracker {
    fn start_run(&self, run_name: &str) -> Result<Run> {
        let run = Run::new(&self.experiment, run_name);
        self.write_meta(&run)?;
        debug!(run_id = %run.run_id, run_name, "Started tracking run");
        Ok(run)
    }

    fn log_artifact(&self, run: &mut Run, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if name.is_empty() || name == META_FILE_NAME || name.contains(['/', '\\']) {
            return Err(MaintenanceError::TrackingError(format!(
                "invalid artifact name '{}'",
                name
            )));
        }
        let path = self.run_dir(&run.run_id).join(name);
        crate::utils::ensure_parent_dir(&path)?;
        fs::write(&path, bytes)?;
        if !run.artifacts.iter().any(|a| a == name) {
            run.artifacts.push(name.to_string());
        }
        debug!(run_id = %run.run_id, artifact = %path.display(), "Logged artifact");
        Ok(path)
    }

    fn end_run(&self, run: &mut Run, status: RunStatus) -> Result<()> {
        run.status = status;
        run.end_time = Some(Utc::now());
        self.write_meta(run)
    }

    fn list_runs(&self) -> Result<Vec<Run>> {
        let dir = self.experiment_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let meta = entry?.path().join(META_FILE_NAME);
            if meta.is_file() {
                runs.push(Self::read_meta(&meta)?);
            }
        }
        runs.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_lifecycle_on_disk() {
        let dir = tempdir().unwrap();
        let tracker = LocalTracker::new(dir.path(), "maintenance");

        let mut run = tracker.start_run("train_metrics").unwrap();
        run.log_metric("f1_score", 0.8);
        let artifact = tracker.log_artifact(&mut run, "model.bin", b"weights").unwrap();
        tracker.end_run(&mut run, RunStatus::Finished).unwrap();

        assert_eq!(fs::read(&artifact).unwrap(), b"weights");
        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Finished);
        assert_eq!(runs[0].metrics["f1_score"], 0.8);
        assert_eq!(runs[0].artifacts, vec!["model.bin".to_string()]);
        assert!(runs[0].end_time.is_some());
        assert!(tracker.run_dir(&run.run_id).join("meta.json").is_file());
    }

    #[test]
    fn test_list_runs_without_experiment() {
        let dir = tempdir().unwrap();
        let tracker = LocalTracker::new(dir.path(), "missing");
        assert!(tracker.list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_artifact_name_validation() {
        let dir = tempdir().unwrap();
        let tracker = LocalTracker::new(dir.path(), "maintenance");
        let mut run = tracker.start_run("r").unwrap();
        assert!(tracker.log_artifact(&mut run, "../escape", b"x").is_err());
        assert!(tracker.log_artifact(&mut run, "meta.json", b"x").is_err());
    }
}
