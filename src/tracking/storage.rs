//! File-system run store
//!
//! Each run is one JSON document at `<base_dir>/<experiment>/<run_id>.json`,
//! rewritten after every change so an interrupted pipeline still leaves the
//! partial run behind.

use super::{ExperimentTracker, RunRecord, RunStatus};
use crate::error::{PipelineError, Result};
use crate::utils;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct LocalTracker {
    base_dir: PathBuf,
    experiment: String,
    active: Option<RunRecord>,
}

impl LocalTracker {
    pub fn new(base_dir: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            experiment: experiment.into(),
            active: None,
        }
    }

    fn experiment_dir(&self) -> PathBuf {
        self.base_dir.join(&self.experiment)
    }

    fn run_file(&self, run_id: &str) -> PathBuf {
        self.experiment_dir().join(format!("{}.json", run_id))
    }

    fn persist(&self) -> Result<()> {
        match &self.active {
            Some(run) => utils::save_json(&self.run_file(&run.run_id), run),
            None => Ok(()),
        }
    }

    fn active_mut(&mut self) -> Result<&mut RunRecord> {
        self.active
            .as_mut()
            .ok_or_else(|| PipelineError::Tracking("no active run".to_string()))
    }

    /// All runs recorded for this experiment, oldest first
    pub fn load_runs(&self) -> Result<Vec<RunRecord>> {
        load_runs(&self.experiment_dir())
    }
}

fn load_runs(dir: &Path) -> Result<Vec<RunRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            runs.push(utils::load_json::<RunRecord>(&path)?);
        }
    }
    runs.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    Ok(runs)
}

impl ExperimentTracker for LocalTracker {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn start_run(&mut self, run_name: &str) -> Result<()> {
        if self.active.is_some() {
            self.end_run()?;
        }
        self.active = Some(RunRecord {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.to_string(),
            experiment: self.experiment.clone(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        });
        self.persist()
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        self.active_mut()?.params.extend(params.clone());
        self.persist()
    }

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()> {
        self.active_mut()?.metrics.extend(metrics.clone());
        self.persist()
    }

    fn end_run(&mut self) -> Result<()> {
        let run = self.active_mut()?;
        run.status = RunStatus::Finished;
        run.end_time = Some(Utc::now());
        self.persist()?;
        self.active = None;
        Ok(())
    }

    fn active_run_id(&self) -> Option<&str> {
        self.active.as_ref().map(|r| r.run_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_run_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), "bank");

        tracker.start_run("RandomForest").unwrap();
        let run_id = tracker.active_run_id().unwrap().to_string();
        tracker
            .log_params(&BTreeMap::from([("n_estimators".to_string(), "100".to_string())]))
            .unwrap();
        tracker
            .log_metrics(&BTreeMap::from([("accuracy".to_string(), 0.91)]))
            .unwrap();
        tracker.end_run().unwrap();
        assert!(tracker.active_run_id().is_none());

        let path = tmp.path().join("bank").join(format!("{}.json", run_id));
        assert!(path.exists());

        let runs = tracker.load_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Finished);
        assert_eq!(runs[0].metrics["accuracy"], 0.91);
        assert_eq!(runs[0].params["n_estimators"], "100");
        assert!(runs[0].end_time.is_some());
    }

    #[test]
    fn test_logging_without_run_fails() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = LocalTracker::new(tmp.path(), "bank");
        assert!(matches!(
            tracker.log_metrics(&BTreeMap::new()),
            Err(PipelineError::Tracking(_))
        ));
    }
}
