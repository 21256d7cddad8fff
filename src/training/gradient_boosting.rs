//! Gradient boosting classifier (binary log-loss)
//!
//! Each round fits a shallow regression tree to the negative gradient
//! `y - p` on a row subsample, then replaces every leaf with its Newton step
//! `sum(y - p) / sum(p(1 - p))`.

use super::decision_tree::DecisionTree;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// `GradientBoosting` block of params.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row fraction drawn (without replacement) per round
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    params: GradientBoostingParams,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
    n_features: usize,
}

impl GradientBoostingClassifier {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::Training("gradient boosting needs at least one row".to_string()));
        }
        if !(self.params.subsample > 0.0 && self.params.subsample <= 1.0) {
            return Err(PipelineError::Config(format!(
                "subsample must be within (0, 1], got {}",
                self.params.subsample
            )));
        }

        self.n_features = x.ncols();
        let prior = (y.iter().sum::<f64>() / n_samples as f64).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (prior / (1.0 - prior)).ln();
        self.feature_importances = vec![0.0; self.n_features];
        self.trees.clear();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.params.random_state);
        let n_sub = ((n_samples as f64 * self.params.subsample).round() as usize).clamp(1, n_samples);

        for round in 0..self.params.n_estimators {
            let probs: Vec<f64> = log_odds.iter().map(|&z| sigmoid(z)).collect();
            let residuals: Vec<f64> = y.iter().zip(&probs).map(|(yi, pi)| yi - pi).collect();

            let rows: Vec<usize> = if n_sub < n_samples {
                let mut picked = sample(&mut rng, n_samples, n_sub).into_vec();
                picked.sort_unstable();
                picked
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.params.max_depth))
                .with_min_samples_leaf(self.params.min_samples_leaf)
                .with_random_state(self.params.random_state.wrapping_add(round as u64));
            tree.fit_indices(x, &residuals, &rows)?;
            tree.refit_leaves(x, &rows, |leaf_rows| {
                let num: f64 = leaf_rows.iter().map(|&i| residuals[i]).sum();
                let den: f64 = leaf_rows.iter().map(|&i| probs[i] * (1.0 - probs[i])).sum();
                if den.abs() < 1e-12 { 0.0 } else { num / den }
            })?;

            let step = tree.predict(x)?;
            log_odds.scaled_add(self.params.learning_rate, &step);

            if let Some(imp) = tree.feature_importances() {
                for (acc, v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                    *acc += v;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            self.feature_importances.iter_mut().for_each(|v| *v /= total);
        }
        Ok(())
    }

    /// Raw additive score (log-odds)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() && self.n_features == 0 {
            return Err(PipelineError::ModelNotFitted);
        }
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.params.learning_rate, &tree.predict(x)?);
        }
        Ok(log_odds)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| if j == 0 { (i % 10) as f64 } else { (i / 10) as f64 });
        let y = (0..100).map(|i| if (i % 10) + (i / 10) > 9 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_boosting_fits_diagonal_boundary() {
        let (x, y) = diagonal();
        let mut model = GradientBoostingClassifier::new(GradientBoostingParams {
            n_estimators: 50,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(&y).filter(|(p, t)| *p == *t).count();
        assert!(correct >= 90, "only {} correct", correct);
        assert!((model.feature_importances().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = diagonal();
        let params = GradientBoostingParams {
            n_estimators: 10,
            subsample: 0.5,
            ..Default::default()
        };
        let mut a = GradientBoostingClassifier::new(params.clone());
        let mut b = GradientBoostingClassifier::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = diagonal();
        let mut model = GradientBoostingClassifier::new(GradientBoostingParams {
            subsample: 0.0,
            ..Default::default()
        });
        assert!(matches!(model.fit(&x, &y), Err(PipelineError::Config(_))));
    }
}
