//! Model trainer stage
//!
//! Fits every candidate family on the transformed training split, scores it
//! on the test split and keeps the most accurate one, provided it clears the
//! configured accuracy threshold.

use super::metrics::ModelMetrics;
use super::models::{ClassifierModel, TrainedModel};
use crate::artifacts::ModelTrainerArtifact;
use crate::config::ModelTrainerConfig;
use crate::error::{PipelineError, Result};
use crate::tracking::{record_run, ExperimentTracker};
use crate::utils::{self, column_names, target_labels, to_feature_matrix};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Scores of one fitted candidate
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub name: String,
    pub train_metrics: ModelMetrics,
    pub test_metrics: ModelMetrics,
    pub fit_secs: f64,
}

/// Index of the strictly highest accuracy; the first candidate wins ties
pub fn select_best(accuracies: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, &acc) in accuracies.iter().enumerate() {
        match best {
            Some(b) if acc <= accuracies[b] => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Fail when the winner's test accuracy is below `expected`
pub fn check_accuracy_gate(name: &str, accuracy: f64, expected: f64) -> Result<()> {
    if accuracy < expected {
        return Err(PipelineError::Training(format!(
            "best model {} reached accuracy {:.4}, below the expected {:.4}",
            name, accuracy, expected
        )));
    }
    Ok(())
}

fn score(model: &ClassifierModel, x: &Array2<f64>, y: &[f64]) -> Result<ModelMetrics> {
    let pred = model.predict(x)?.to_vec();
    let proba = model.predict_proba(x).ok().map(|p| p.to_vec());
    let (metrics, _) = ModelMetrics::compute(y, &pred, proba.as_deref());
    Ok(metrics)
}

pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    fn load_split(&self) -> Result<(Vec<String>, Array2<f64>, Vec<f64>, Array2<f64>, Vec<f64>)> {
        let target = self.config.target_column.as_str();
        let train = utils::load_non_empty_csv(&self.config.train_data_path)?;
        let test = utils::load_non_empty_csv(&self.config.test_data_path)?;

        let features: Vec<String> = column_names(&train).into_iter().filter(|c| c != target).collect();
        if features.is_empty() {
            return Err(PipelineError::Data("training data has no feature columns".to_string()));
        }

        let x_train = to_feature_matrix(&train, &features)?;
        let y_train = target_labels(&train, target)?;
        let x_test = to_feature_matrix(&test, &features)?;
        let y_test = target_labels(&test, target)?;
        Ok((features, x_train, y_train, x_test, y_test))
    }

    /// Train all candidates, logging one tracker run per candidate, then
    /// persist the winner
    pub fn initiate_model_trainer(&self, tracker: &mut dyn ExperimentTracker) -> Result<ModelTrainerArtifact> {
        let (features, x_train, y_train, x_test, y_test) = self.load_split()?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = features.len(),
            "Training candidate models"
        );

        let mut fitted = Vec::new();
        let mut results = Vec::new();
        for mut model in ClassifierModel::candidates(&self.config.model_params) {
            let start = Instant::now();
            model.fit(&x_train, &y_train)?;
            let fit_secs = start.elapsed().as_secs_f64();

            let result = CandidateResult {
                name: model.name().to_string(),
                train_metrics: score(&model, &x_train, &y_train)?,
                test_metrics: score(&model, &x_test, &y_test)?,
                fit_secs,
            };
            info!(
                model = %result.name,
                accuracy = result.test_metrics.accuracy,
                f1 = result.test_metrics.f1,
                train_accuracy = result.train_metrics.accuracy,
                fit_secs,
                "Candidate evaluated"
            );

            let metrics = BTreeMap::from([
                ("accuracy".to_string(), result.test_metrics.accuracy),
                ("f1_score".to_string(), result.test_metrics.f1),
                ("train_accuracy".to_string(), result.train_metrics.accuracy),
            ]);
            record_run(tracker, &result.name, &model.params(), &metrics);

            fitted.push(model);
            results.push(result);
        }

        let accuracies: Vec<f64> = results.iter().map(|r| r.test_metrics.accuracy).collect();
        let best_idx = select_best(&accuracies)
            .ok_or_else(|| PipelineError::Training("no candidate models were trained".to_string()))?;
        let best = results[best_idx].clone();

        if let Err(e) = check_accuracy_gate(&best.name, best.test_metrics.accuracy, self.config.expected_accuracy) {
            warn!(
                model = %best.name,
                accuracy = best.test_metrics.accuracy,
                expected = self.config.expected_accuracy,
                "No model met the accuracy threshold"
            );
            return Err(e);
        }

        let model_path = self.config.model_path();
        let trained = TrainedModel::new(fitted.swap_remove(best_idx), features.clone());
        trained.save(&model_path)?;

        let summary_params = BTreeMap::from([
            ("best_model".to_string(), best.name.clone()),
            ("n_features".to_string(), features.len().to_string()),
            ("expected_accuracy".to_string(), self.config.expected_accuracy.to_string()),
        ]);
        let summary_metrics = BTreeMap::from([
            ("best_accuracy".to_string(), best.test_metrics.accuracy),
            ("best_f1_score".to_string(), best.test_metrics.f1),
        ]);
        record_run(tracker, "model_selection_summary", &summary_params, &summary_metrics);

        info!(model = %best.name, accuracy = best.test_metrics.accuracy, path = %model_path.display(), "Best model persisted");

        Ok(ModelTrainerArtifact {
            trained_model_file_path: model_path,
            best_model_name: best.name,
            train_metric_artifact: best.train_metrics,
            test_metric_artifact: best.test_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigurationManager, ModelParams, PipelineConfig, Schema};
    use crate::tracking::LocalTracker;
    use crate::training::{GradientBoostingParams, RandomForestParams};
    use polars::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_select_best_strict_max() {
        assert_eq!(select_best(&[0.85, 0.62, 0.91]), Some(2));
        assert_eq!(select_best(&[0.80, 0.80, 0.70]), Some(0));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_gate() {
        let accuracies = [0.85, 0.80, 0.70];
        let best = select_best(&accuracies).unwrap();
        assert!(matches!(
            check_accuracy_gate("RandomForest", accuracies[best], 0.90),
            Err(PipelineError::Training(_))
        ));

        let accuracies = [0.85, 0.62, 0.91];
        let best = select_best(&accuracies).unwrap();
        assert_eq!(best, 2);
        assert!(check_accuracy_gate("GradientBoosting", accuracies[best], 0.60).is_ok());
    }

    fn write_split(path: &std::path::Path, n: usize, conflicting: bool) {
        let x1: Vec<f64> = (0..n).map(|i| (i % 20) as f64 / 5.0 - 2.0).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 / 5.0 - 1.0).collect();
        let y: Vec<i64> = (0..n)
            .map(|i| {
                let base = i64::from(i % 20 >= 10);
                // Same features, opposite label: no model can be perfect
                if conflicting && i % 20 == 0 { 1 - base } else { base }
            })
            .collect();
        let mut df = df!("x1" => x1, "x2" => x2, "y" => y).unwrap();
        utils::save_csv(&mut df, path).unwrap();
    }

    fn setup(expected_accuracy: f64) -> (TempDir, ModelTrainerConfig) {
        let tmp = TempDir::new().unwrap();
        let mut config = PipelineConfig::with_root(&tmp.path().join("artifacts"), None);
        config.model_trainer.expected_accuracy = expected_accuracy;
        let params = ModelParams {
            random_forest: RandomForestParams { n_estimators: 10, ..Default::default() },
            gradient_boosting: GradientBoostingParams { n_estimators: 20, ..Default::default() },
            ..Default::default()
        };
        let manager = ConfigurationManager::from_parts(config, params, Schema::default()).unwrap();
        let trainer_config = manager.model_trainer_config().unwrap();
        write_split(&trainer_config.train_data_path, 200, false);
        write_split(&trainer_config.test_data_path, 60, true);
        (tmp, trainer_config)
    }

    #[test]
    fn test_trainer_persists_best_model() {
        let (tmp, config) = setup(0.6);
        let mut tracker = LocalTracker::new(tmp.path().join("runs"), "bank");
        let artifact = ModelTrainer::new(config.clone()).initiate_model_trainer(&mut tracker).unwrap();

        assert!(artifact.trained_model_file_path.exists());
        assert!(artifact.test_metric_artifact.accuracy >= 0.6);
        let model = TrainedModel::load(&artifact.trained_model_file_path).unwrap();
        assert_eq!(model.name, artifact.best_model_name);
        assert_eq!(model.feature_names, vec!["x1", "x2"]);

        // three candidate runs plus the summary
        assert_eq!(tracker.load_runs().unwrap().len(), 4);
    }

    #[test]
    fn test_trainer_below_threshold_writes_nothing() {
        let (tmp, config) = setup(1.0);
        let mut tracker = LocalTracker::new(tmp.path().join("runs"), "bank");
        let result = ModelTrainer::new(config.clone()).initiate_model_trainer(&mut tracker);

        assert!(matches!(result, Err(PipelineError::Training(_))));
        assert!(!config.model_path().exists());
        // candidate runs are logged even when every candidate loses
        assert_eq!(tracker.load_runs().unwrap().len(), 3);
    }
}
