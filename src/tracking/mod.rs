//! Experiment tracking
//!
//! Trainer and evaluation log parameters and metrics through the
//! [`ExperimentTracker`] trait. Runs land either in local JSON files or on
//! an MLflow server, picked from the tracking URI.

pub mod mlflow;
pub mod retry;
pub mod storage;

pub use mlflow::MlflowTracker;
pub use retry::RetryPolicy;
pub use storage::LocalTracker;

use crate::config::TrackingConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
}

/// One tracked run as stored by [`LocalTracker`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
}

pub trait ExperimentTracker: Send {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    fn start_run(&mut self, run_name: &str) -> Result<()>;

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()>;

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()>;

    fn end_run(&mut self) -> Result<()>;

    fn active_run_id(&self) -> Option<&str>;
}

/// Log one complete run. Tracking problems are reported and then ignored.
pub fn record_run(
    tracker: &mut dyn ExperimentTracker,
    run_name: &str,
    params: &BTreeMap<String, String>,
    metrics: &BTreeMap<String, f64>,
) {
    let outcome = tracker
        .start_run(run_name)
        .and_then(|_| tracker.log_params(params))
        .and_then(|_| tracker.log_metrics(metrics))
        .and_then(|_| tracker.end_run());
    if let Err(e) = outcome {
        warn!(run_name, backend = tracker.backend(), error = %e, "Experiment tracking failed; continuing");
    }
}

/// Flatten a serialisable parameter struct into string key/values
pub fn params_to_map<T: Serialize>(params: &T) -> BTreeMap<String, String> {
    match serde_json::to_value(params) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Pick the tracker for `config.uri`: empty or `file:` gives local JSON runs,
/// http(s) an MLflow server with local fallback when it cannot be reached
pub fn tracker_from_config(config: &TrackingConfig) -> Box<dyn ExperimentTracker> {
    tracker_with_policy(config, &RetryPolicy::default())
}

pub fn tracker_with_policy(config: &TrackingConfig, policy: &RetryPolicy) -> Box<dyn ExperimentTracker> {
    let uri = config.uri.trim();
    let local = |dir: PathBuf| -> Box<dyn ExperimentTracker> {
        info!(dir = %dir.display(), experiment = %config.experiment_name, "Tracking runs locally");
        Box::new(LocalTracker::new(dir, config.experiment_name.clone()))
    };

    if uri.is_empty() {
        return local(config.local_dir.clone());
    }
    if let Some(path) = uri.strip_prefix("file:") {
        let path = path.trim_start_matches("//");
        return if path.is_empty() { local(config.local_dir.clone()) } else { local(PathBuf::from(path)) };
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return match MlflowTracker::connect(uri, &config.experiment_name, policy) {
            Ok(tracker) => Box::new(tracker),
            Err(e) => {
                warn!(uri, error = %e, "MLflow unavailable; falling back to local tracking");
                local(config.local_dir.clone())
            }
        };
    }

    warn!(uri, "Unsupported tracking URI scheme; using local tracking");
    local(config.local_dir.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::RandomForestParams;
    use tempfile::TempDir;

    fn config(uri: &str, dir: &std::path::Path) -> TrackingConfig {
        TrackingConfig {
            uri: uri.to_string(),
            experiment_name: "bank".to_string(),
            local_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_params_to_map() {
        let map = params_to_map(&RandomForestParams::default());
        assert_eq!(map["n_estimators"], "100");
        assert_eq!(map["max_features"], "sqrt");
        assert_eq!(map["max_depth"], "10");
    }

    #[test]
    fn test_empty_uri_is_local() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = tracker_from_config(&config("", tmp.path()));
        assert_eq!(tracker.backend(), "local");

        record_run(
            tracker.as_mut(),
            "summary",
            &BTreeMap::new(),
            &BTreeMap::from([("accuracy".to_string(), 0.9)]),
        );
        let runs = LocalTracker::new(tmp.path(), "bank").load_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_name, "summary");
    }

    #[test]
    fn test_unreachable_mlflow_falls_back() {
        let tmp = TempDir::new().unwrap();
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let uri = format!("http://127.0.0.1:{}", port);
        let tracker = tracker_with_policy(&config(&uri, tmp.path()), &RetryPolicy::none());
        assert_eq!(tracker.backend(), "local");
    }

    #[test]
    fn test_record_run_swallows_errors() {
        struct Broken;
        impl ExperimentTracker for Broken {
            fn backend(&self) -> &'static str {
                "broken"
            }
            fn start_run(&mut self, _: &str) -> Result<()> {
                Err(crate::error::PipelineError::Tracking("down".into()))
            }
            fn log_params(&mut self, _: &BTreeMap<String, String>) -> Result<()> {
                Ok(())
            }
            fn log_metrics(&mut self, _: &BTreeMap<String, f64>) -> Result<()> {
                Ok(())
            }
            fn end_run(&mut self) -> Result<()> {
                Ok(())
            }
            fn active_run_id(&self) -> Option<&str> {
                None
            }
        }
        record_run(&mut Broken, "x", &BTreeMap::new(), &BTreeMap::new());
    }
}
