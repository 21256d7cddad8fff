//! Candidate model families and the persisted model envelope

use super::gradient_boosting::GradientBoostingClassifier;
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForestClassifier;
use crate::config::ModelParams;
use crate::error::{PipelineError, Result};
use crate::tracking::params_to_map;
use crate::utils;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Enum to hold the fitted candidate families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    RandomForest(RandomForestClassifier),
    LogisticRegression(LogisticRegression),
    GradientBoosting(GradientBoostingClassifier),
}

impl ClassifierModel {
    /// One unfitted model per family, in enumeration order
    pub fn candidates(params: &ModelParams) -> Vec<ClassifierModel> {
        vec![
            ClassifierModel::RandomForest(RandomForestClassifier::new(params.random_forest.clone())),
            ClassifierModel::LogisticRegression(LogisticRegression::new(params.logistic_regression.clone())),
            ClassifierModel::GradientBoosting(GradientBoostingClassifier::new(params.gradient_boosting.clone())),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClassifierModel::RandomForest(_) => "RandomForest",
            ClassifierModel::LogisticRegression(_) => "LogisticRegression",
            ClassifierModel::GradientBoosting(_) => "GradientBoosting",
        }
    }

    /// Hyperparameters as logged to the experiment tracker
    pub fn params(&self) -> BTreeMap<String, String> {
        match self {
            ClassifierModel::RandomForest(m) => params_to_map(m.params()),
            ClassifierModel::LogisticRegression(m) => params_to_map(m.params()),
            ClassifierModel::GradientBoosting(m) => params_to_map(m.params()),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        match self {
            ClassifierModel::RandomForest(m) => m.fit(x, y),
            ClassifierModel::LogisticRegression(m) => m.fit(x, y),
            ClassifierModel::GradientBoosting(m) => m.fit(x, y),
        }
    }

    /// Class labels (0/1)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ClassifierModel::RandomForest(m) => m.predict(x),
            ClassifierModel::LogisticRegression(m) => m.predict(x),
            ClassifierModel::GradientBoosting(m) => m.predict(x),
        }
    }

    /// Positive-class probability
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ClassifierModel::RandomForest(m) => m.predict_proba(x),
            ClassifierModel::LogisticRegression(m) => m.predict_proba(x),
            ClassifierModel::GradientBoosting(m) => m.predict_proba(x),
        }
    }
}

/// Model artifact written by the trainer and read by evaluation and serving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    /// Column order the model was fitted on
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub model: ClassifierModel,
}

impl TrainedModel {
    pub fn new(model: ClassifierModel, feature_names: Vec<String>) -> Self {
        Self {
            name: model.name().to_string(),
            feature_names,
            trained_at: Utc::now(),
            model,
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.feature_names.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.feature_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        self.model.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        self.model.predict_proba(x)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        utils::save_bin(path, self)?;
        info!(path = %path.display(), model = %self.name, "Model saved");
        Ok(())
    }

    /// Missing files surface as `ModelNotFound`
    pub fn load(path: &Path) -> Result<Self> {
        utils::load_bin(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| if j == 0 { (i % 40) as f64 / 4.0 } else { (i % 3) as f64 });
        let y = (0..80).map(|i| if i % 40 >= 20 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_candidates_in_order() {
        let names: Vec<_> = ClassifierModel::candidates(&ModelParams::default())
            .iter()
            .map(|m| m.name())
            .collect();
        assert_eq!(names, vec!["RandomForest", "LogisticRegression", "GradientBoosting"]);
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let (x, y) = data();
        let tmp = TempDir::new().unwrap();
        for mut model in ClassifierModel::candidates(&ModelParams::default()) {
            model.fit(&x, &y).unwrap();
            let trained = TrainedModel::new(model, vec!["a".into(), "b".into()]);
            let path = tmp.path().join(format!("{}.bin", trained.name));
            trained.save(&path).unwrap();

            let loaded = TrainedModel::load(&path).unwrap();
            assert_eq!(loaded.name, trained.name);
            assert_eq!(loaded.predict_proba(&x).unwrap(), trained.predict_proba(&x).unwrap());
            assert_eq!(loaded.predict(&x).unwrap(), trained.predict(&x).unwrap());
        }
    }

    #[test]
    fn test_width_mismatch_and_missing_file() {
        let (x, y) = data();
        let mut model = ClassifierModel::candidates(&ModelParams::default()).remove(1);
        model.fit(&x, &y).unwrap();
        let trained = TrainedModel::new(model, vec!["a".into(), "b".into()]);
        assert!(trained.predict(&Array2::zeros((1, 5))).is_err());

        let missing = TrainedModel::load(Path::new("/nonexistent/model.bin"));
        assert!(matches!(missing, Err(PipelineError::ModelNotFound(_))));
    }
}
