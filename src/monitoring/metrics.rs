//! Prometheus collectors
//!
//! Each component owns its own `Registry`; nothing is registered globally,
//! so tests and multiple servers in one process never collide.

use crate::error::Result;
use crate::training::ModelMetrics;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Render every metric family in `registry` in the text exposition format
pub fn encode(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::PipelineError::Serialization(e.to_string()))
}

/// Stage outcomes, dataset sizes and final model scores of a training run
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Registry,
    stage_runs: IntCounterVec,
    stage_duration: HistogramVec,
    dataset_rows: IntGaugeVec,
    feature_count: IntGauge,
    model_scores: GaugeVec,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let stage_runs = IntCounterVec::new(
            Opts::new("ml_stage_runs_total", "Pipeline stage executions by outcome"),
            &["stage", "outcome"],
        )?;
        let stage_duration = HistogramVec::new(
            HistogramOpts::new("ml_stage_duration_seconds", "Pipeline stage wall time in seconds")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
            &["stage"],
        )?;
        let dataset_rows = IntGaugeVec::new(Opts::new("ml_dataset_rows", "Rows per data split"), &["split"])?;
        let feature_count = IntGauge::new("ml_feature_count", "Features fed to the model")?;
        let model_scores = GaugeVec::new(Opts::new("ml_model_score", "Evaluation metrics of the latest model"), &["metric"])?;

        registry.register(Box::new(stage_runs.clone()))?;
        registry.register(Box::new(stage_duration.clone()))?;
        registry.register(Box::new(dataset_rows.clone()))?;
        registry.register(Box::new(feature_count.clone()))?;
        registry.register(Box::new(model_scores.clone()))?;

        Ok(Self {
            registry,
            stage_runs,
            stage_duration,
            dataset_rows,
            feature_count,
            model_scores,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_stage(&self, stage: &str, success: bool, seconds: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.stage_runs.with_label_values(&[stage, outcome]).inc();
        self.stage_duration.with_label_values(&[stage]).observe(seconds);
    }

    pub fn stage_count(&self, stage: &str, success: bool) -> u64 {
        let outcome = if success { "success" } else { "failure" };
        self.stage_runs.with_label_values(&[stage, outcome]).get()
    }

    pub fn set_split_rows(&self, split: &str, rows: usize) {
        self.dataset_rows.with_label_values(&[split]).set(rows as i64);
    }

    pub fn set_feature_count(&self, n: usize) {
        self.feature_count.set(n as i64);
    }

    pub fn set_model_scores(&self, metrics: &ModelMetrics) {
        for (name, value) in [
            ("accuracy", metrics.accuracy),
            ("precision", metrics.precision),
            ("recall", metrics.recall),
            ("f1", metrics.f1),
            ("auc", metrics.auc),
        ] {
            self.model_scores.with_label_values(&[name]).set(value);
        }
    }

    pub fn render(&self) -> Result<String> {
        encode(&self.registry)
    }
}

/// Request counters of the prediction service
#[derive(Clone)]
pub struct ServingMetrics {
    registry: Registry,
    requests: IntCounter,
    failures: IntCounter,
    latency: Histogram,
    model_loaded: IntGauge,
}

impl ServingMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let requests = IntCounter::new("prediction_requests_total", "Prediction requests received")?;
        let failures = IntCounter::new("prediction_failures_total", "Prediction requests that failed")?;
        let latency = Histogram::with_opts(
            HistogramOpts::new("prediction_latency_seconds", "Prediction handling time in seconds")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        let model_loaded = IntGauge::new("model_loaded", "1 when a model artifact is loaded")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(model_loaded.clone()))?;

        Ok(Self {
            registry,
            requests,
            failures,
            latency,
            model_loaded,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_failure(&self) {
        self.failures.inc();
    }

    pub fn observe_latency(&self, seconds: f64) {
        self.latency.observe(seconds);
    }

    pub fn set_model_loaded(&self, loaded: bool) {
        self.model_loaded.set(i64::from(loaded));
    }

    pub fn total_requests(&self) -> u64 {
        self.requests.get()
    }

    pub fn failed_requests(&self) -> u64 {
        self.failures.get()
    }

    pub fn render(&self) -> Result<String> {
        encode(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_render() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.record_stage("ingestion", true, 0.4);
        metrics.record_stage("training", false, 2.0);
        metrics.set_split_rows("train", 10_000);
        metrics.set_model_scores(&ModelMetrics {
            accuracy: 0.9,
            ..Default::default()
        });

        assert_eq!(metrics.stage_count("ingestion", true), 1);
        assert_eq!(metrics.stage_count("training", false), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("ml_stage_runs_total{outcome=\"success\",stage=\"ingestion\"} 1"));
        assert!(text.contains("ml_dataset_rows{split=\"train\"} 10000"));
        assert!(text.contains("ml_model_score{metric=\"accuracy\"} 0.9"));
    }

    #[test]
    fn test_serving_metrics_are_independent() {
        let a = ServingMetrics::new().unwrap();
        let b = ServingMetrics::new().unwrap();
        a.record_request();
        a.record_request();
        a.record_failure();
        a.set_model_loaded(true);

        assert_eq!(a.total_requests(), 2);
        assert_eq!(a.failed_requests(), 1);
        assert_eq!(b.total_requests(), 0);

        let text = a.render().unwrap();
        assert!(text.contains("prediction_requests_total 2"));
        assert!(text.contains("model_loaded 1"));
    }
}
