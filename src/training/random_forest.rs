//! Random Forest classifier: bootstrap bagging of CART trees

use super::decision_tree::DecisionTree;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for features considered per split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fraction(f64),
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
        }
        .clamp(1, n_features.max(1))
    }
}

/// `RandomForest` block of params.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub random_state: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: RandomForestParams,
    trees: Vec<DecisionTree>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForestClassifier {
    pub fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    /// Fit on 0/1 labels; trees are built in parallel, each with its own seed
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || self.params.n_estimators == 0 {
            return Err(PipelineError::Training("random forest needs rows and at least one tree".to_string()));
        }

        self.n_features = x.ncols();
        let max_features = self.params.max_features.resolve(self.n_features);
        let base_seed = self.params.random_state;
        let params = &self.params;

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut tree = DecisionTree::new_classifier()
                    .with_max_depth(params.max_depth)
                    .with_min_samples_split(params.min_samples_split)
                    .with_min_samples_leaf(params.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_random_state(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
                tree.fit_indices(x, y, &sample)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = Array1::<f64>::zeros(self.n_features);
        for tree in &trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }

        self.trees = trees;
        self.feature_importances = Some(importances);
        Ok(())
    }

    /// Mean positive-class probability across trees
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let sums = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .try_reduce(|| Array1::zeros(x.nrows()), |a, b| Ok(a + b))?;
        Ok(sums / self.trees.len() as f64)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Array2<f64>, Vec<f64>) {
        let n = 200;
        let x = Array2::from_shape_fn((n, 3), |(i, j)| {
            let label = (i % 2) as f64;
            let jitter = ((i * 7 + j * 13) % 10) as f64 / 10.0;
            if j == 0 { label * 3.0 + jitter } else { jitter }
        });
        let y = (0..n).map(|i| (i % 2) as f64).collect();
        (x, y)
    }

    fn small_params() -> RandomForestParams {
        RandomForestParams {
            n_estimators: 15,
            max_depth: Some(4),
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForestClassifier::new(small_params());
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let pred = forest.predict(&x).unwrap();
        let correct = pred.iter().zip(&y).filter(|(p, t)| *p == *t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);

        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = blobs();
        let mut a = RandomForestClassifier::new(small_params());
        let mut b = RandomForestClassifier::new(small_params());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(30), 6);
        assert_eq!(MaxFeatures::Fixed(100).resolve(5), 5);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }

    #[test]
    fn test_unfitted_forest() {
        let forest = RandomForestClassifier::new(small_params());
        assert!(forest.predict(&Array2::zeros((1, 3))).is_err());
    }
}
