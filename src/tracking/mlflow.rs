//! MLflow REST client
//!
//! Only experiment lookup goes through the retry policy. After that every
//! call is best effort: failures are logged and swallowed so a flaky
//! tracking server never costs a training run.

use super::retry::RetryPolicy;
use super::ExperimentTracker;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

const API_PREFIX: &str = "api/2.0/mlflow";

#[derive(Deserialize)]
struct ExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunEnvelope,
}

#[derive(Deserialize)]
struct RunEnvelope {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

pub struct MlflowTracker {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    experiment_id: String,
    run_id: Option<String>,
}

impl MlflowTracker {
    /// Resolve (or create) the experiment, retrying per `policy`
    pub fn connect(uri: &str, experiment: &str, policy: &RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PipelineError::Tracking(e.to_string()))?;

        let credentials = match (
            std::env::var("MLFLOW_TRACKING_USERNAME"),
            std::env::var("MLFLOW_TRACKING_PASSWORD"),
        ) {
            (Ok(user), Ok(password)) if !user.is_empty() => Some((user, password)),
            _ => None,
        };

        let mut tracker = Self {
            client,
            base_url: uri.trim_end_matches('/').to_string(),
            credentials,
            experiment_id: String::new(),
            run_id: None,
        };
        let experiment_id = policy.run("mlflow experiment lookup", || tracker.resolve_experiment(experiment))?;
        tracker.experiment_id = experiment_id;
        info!(uri, experiment, experiment_id = %tracker.experiment_id, "Connected to MLflow");
        Ok(tracker)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<reqwest::blocking::Response> {
        let response = self
            .authed(self.client.post(self.endpoint(path)).json(body))
            .send()
            .map_err(|e| PipelineError::Tracking(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::Tracking(format!("{} returned {}", path, response.status())));
        }
        Ok(response)
    }

    fn resolve_experiment(&self, name: &str) -> Result<String> {
        let response = self
            .authed(
                self.client
                    .get(self.endpoint("experiments/get-by-name"))
                    .query(&[("experiment_name", name)]),
            )
            .send()
            .map_err(|e| PipelineError::Tracking(e.to_string()))?;

        if response.status().is_success() {
            let body: ExperimentResponse = response.json().map_err(|e| PipelineError::Tracking(e.to_string()))?;
            return Ok(body.experiment.experiment_id);
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::Tracking(format!(
                "experiment lookup returned {}",
                response.status()
            )));
        }

        let created: CreateExperimentResponse = self
            .post("experiments/create", &json!({ "name": name }))?
            .json()
            .map_err(|e| PipelineError::Tracking(e.to_string()))?;
        Ok(created.experiment_id)
    }

    fn log_batch(&self, body: Value) {
        if let Err(e) = self.post("runs/log-batch", &body) {
            warn!(error = %e, "MLflow log-batch failed; continuing");
        }
    }
}

impl ExperimentTracker for MlflowTracker {
    fn backend(&self) -> &'static str {
        "mlflow"
    }

    fn start_run(&mut self, run_name: &str) -> Result<()> {
        let body = json!({
            "experiment_id": self.experiment_id,
            "run_name": run_name,
            "start_time": Utc::now().timestamp_millis(),
            "tags": [{ "key": "mlflow.runName", "value": run_name }],
        });
        self.run_id = match self
            .post("runs/create", &body)
            .and_then(|r| r.json::<CreateRunResponse>().map_err(|e| PipelineError::Tracking(e.to_string())))
        {
            Ok(created) => Some(created.run.info.run_id),
            Err(e) => {
                warn!(run_name, error = %e, "MLflow run creation failed; run will not be tracked");
                None
            }
        };
        Ok(())
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> Result<()> {
        if let Some(run_id) = &self.run_id {
            let params: Vec<Value> = params.iter().map(|(k, v)| json!({ "key": k, "value": v })).collect();
            self.log_batch(json!({ "run_id": run_id, "params": params }));
        }
        Ok(())
    }

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(run_id) = &self.run_id {
            let timestamp = Utc::now().timestamp_millis();
            let metrics: Vec<Value> = metrics
                .iter()
                .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": timestamp, "step": 0 }))
                .collect();
            self.log_batch(json!({ "run_id": run_id, "metrics": metrics }));
        }
        Ok(())
    }

    fn end_run(&mut self) -> Result<()> {
        if let Some(run_id) = self.run_id.take() {
            let body = json!({
                "run_id": run_id,
                "status": "FINISHED",
                "end_time": Utc::now().timestamp_millis(),
            });
            if let Err(e) = self.post("runs/update", &body) {
                warn!(error = %e, "MLflow run update failed; continuing");
            }
        }
        Ok(())
    }

    fn active_run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }
}
