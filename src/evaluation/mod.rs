//! Model evaluation stage
//!
//! Scores the persisted model on the held-out split, writes metrics.json and
//! compares the result with the metrics recorded by the previous evaluation.

use crate::artifacts::ModelEvaluationArtifact;
use crate::config::ModelEvaluationConfig;
use crate::error::Result;
use crate::tracking::{record_run, ExperimentTracker};
use crate::training::{ModelMetrics, TrainedModel};
use crate::utils::{self, target_labels, to_feature_matrix};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Verdict of the new model against the previously recorded one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChampionComparison {
    pub is_model_accepted: bool,
    pub improved_accuracy: f64,
}

/// New model is accepted unless it is strictly less accurate than the
/// previous one; without history it is always accepted
pub fn compare_with_champion(new: &ModelMetrics, previous: Option<&ModelMetrics>) -> ChampionComparison {
    match previous {
        Some(prev) => ChampionComparison {
            is_model_accepted: new.accuracy >= prev.accuracy,
            improved_accuracy: new.accuracy - prev.accuracy,
        },
        None => ChampionComparison {
            is_model_accepted: true,
            improved_accuracy: 0.0,
        },
    }
}

fn previous_metrics(path: &Path) -> Option<ModelMetrics> {
    if !path.exists() {
        return None;
    }
    match utils::load_json::<ModelMetrics>(path) {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable previous metrics");
            None
        }
    }
}

pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
}

impl ModelEvaluation {
    pub fn new(config: ModelEvaluationConfig) -> Self {
        Self { config }
    }

    /// Score the model on the test split
    pub fn evaluate(&self, model: &TrainedModel) -> Result<ModelMetrics> {
        let test = utils::load_non_empty_csv(&self.config.test_data_path)?;
        let x = to_feature_matrix(&test, &model.feature_names)?;
        let y = target_labels(&test, &self.config.target_column)?;

        let pred = model.predict(&x)?.to_vec();
        let proba = match model.predict_proba(&x) {
            Ok(p) => Some(p.to_vec()),
            Err(e) => {
                warn!(error = %e, "Probability output unavailable");
                None
            }
        };

        let (metrics, auc) = ModelMetrics::compute(&y, &pred, proba.as_deref());
        if auc.is_none() {
            warn!(auc = metrics.auc, "AUC could not be computed; reporting the default");
        }
        Ok(metrics)
    }

    pub fn initiate_model_evaluation(&self, tracker: &mut dyn ExperimentTracker) -> Result<ModelEvaluationArtifact> {
        let model = TrainedModel::load(&self.config.model_path)?;
        let metrics = self.evaluate(&model)?;

        let previous = previous_metrics(&self.config.metric_file_name);
        let verdict = compare_with_champion(&metrics, previous.as_ref());
        utils::save_json(&self.config.metric_file_name, &metrics)?;

        let logged = BTreeMap::from([
            ("eval_accuracy".to_string(), metrics.accuracy),
            ("eval_precision".to_string(), metrics.precision),
            ("eval_recall".to_string(), metrics.recall),
            ("eval_f1_score".to_string(), metrics.f1),
            ("eval_auc_score".to_string(), metrics.auc),
        ]);
        let params = BTreeMap::from([("model".to_string(), model.name.clone())]);
        record_run(tracker, "model_evaluation", &params, &logged);

        info!(
            model = %model.name,
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            auc = metrics.auc,
            accepted = verdict.is_model_accepted,
            improved_accuracy = verdict.improved_accuracy,
            "Model evaluation completed"
        );

        Ok(ModelEvaluationArtifact {
            is_model_accepted: verdict.is_model_accepted,
            improved_accuracy: verdict.improved_accuracy,
            best_model_path: self.config.model_path.clone(),
            trained_model_path: self.config.model_path.clone(),
            metric_file_path: self.config.metric_file_name.clone(),
            train_model_metric_artifact: metrics,
            best_model_metric_artifact: previous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigurationManager, ModelParams, PipelineConfig, Schema};
    use crate::error::PipelineError;
    use crate::tracking::LocalTracker;
    use crate::training::ClassifierModel;
    use ndarray::Array2;
    use polars::prelude::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ModelEvaluationConfig) {
        let tmp = TempDir::new().unwrap();
        let manager = ConfigurationManager::from_parts(
            PipelineConfig::with_root(&tmp.path().join("artifacts"), None),
            ModelParams::default(),
            Schema::default(),
        )
        .unwrap();
        (tmp, manager.model_evaluation_config().unwrap())
    }

    fn fit_and_save(config: &ModelEvaluationConfig) {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| (i as f64 - 20.0) / 10.0);
        let y: Vec<f64> = (0..40).map(|i| if i >= 20 { 1.0 } else { 0.0 }).collect();
        let mut model = ClassifierModel::candidates(&ModelParams::default()).remove(1);
        model.fit(&x, &y).unwrap();
        TrainedModel::new(model, vec!["x".to_string()]).save(&config.model_path).unwrap();

        let mut test = df!(
            "x" => [-1.8, -1.5, 1.0, 1.5],
            "y" => [0i64, 0, 1, 1]
        )
        .unwrap();
        utils::save_csv(&mut test, &config.test_data_path).unwrap();
    }

    #[test]
    fn test_champion_comparison() {
        let new = ModelMetrics { accuracy: 0.9, ..Default::default() };
        let prev = ModelMetrics { accuracy: 0.85, ..Default::default() };
        let verdict = compare_with_champion(&new, Some(&prev));
        assert!(verdict.is_model_accepted);
        assert!((verdict.improved_accuracy - 0.05).abs() < 1e-12);

        assert!(!compare_with_champion(&prev, Some(&new)).is_model_accepted);
        assert_eq!(
            compare_with_champion(&new, None),
            ChampionComparison { is_model_accepted: true, improved_accuracy: 0.0 }
        );
    }

    #[test]
    fn test_evaluation_writes_metrics_and_compares() {
        let (tmp, config) = setup();
        fit_and_save(&config);
        let mut tracker = LocalTracker::new(tmp.path().join("runs"), "bank");
        let stage = ModelEvaluation::new(config.clone());

        let first = stage.initiate_model_evaluation(&mut tracker).unwrap();
        assert!(first.is_model_accepted);
        assert!(first.best_model_metric_artifact.is_none());
        assert_eq!(first.train_model_metric_artifact.accuracy, 1.0);
        assert_eq!(first.train_model_metric_artifact.auc, 1.0);

        let written: serde_json::Value = utils::load_json(&config.metric_file_name).unwrap();
        for key in ["accuracy", "precision", "recall", "f1", "auc"] {
            assert!(written.get(key).is_some(), "missing {}", key);
        }

        let second = stage.initiate_model_evaluation(&mut tracker).unwrap();
        assert!(second.is_model_accepted);
        assert_eq!(second.improved_accuracy, 0.0);
        assert!(second.best_model_metric_artifact.is_some());
        assert_eq!(tracker.load_runs().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_model() {
        let (tmp, config) = setup();
        let mut tracker = LocalTracker::new(tmp.path().join("runs"), "bank");
        let result = ModelEvaluation::new(config).initiate_model_evaluation(&mut tracker);
        assert!(matches!(result, Err(PipelineError::ModelNotFound(_))));
    }
}
