//! CART decision tree
//!
//! Split search sorts each candidate feature once per node and sweeps the
//! thresholds with running sums, so both criteria only need (count, sum,
//! sum of squares). Classification trees are binary: leaves hold the
//! positive-class fraction.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn refit_leaves<F>(&mut self, x: &Array2<f64>, indices: &[usize], f: &F)
    where
        F: Fn(&[usize]) -> f64,
    {
        match self {
            TreeNode::Leaf { value, .. } => *value = f(indices),
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                let (l, r): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                left.refit_leaves(x, &l, f);
                right.refit_leaves(x, &r, f);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity over 0/1 labels
    Gini,
    /// Variance (regression)
    MSE,
}

impl Criterion {
    fn impurity(&self, count: f64, sum: f64, sq_sum: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => {
                let p = sum / count;
                2.0 * p * (1.0 - p)
            }
            Criterion::MSE => (sq_sum / count - (sum / count).powi(2)).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: f64,
    sum: f64,
    sq_sum: f64,
}

impl Stats {
    fn add(&mut self, y: f64) {
        self.count += 1.0;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per node; `None` considers all of them
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on every row
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    /// Fit on the given rows (duplicates allowed, as in a bootstrap sample)
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &[f64], indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(PipelineError::Training("cannot fit a tree on zero rows".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let root = self.build_tree(x, y, indices.to_vec(), 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let mut stats = Stats::default();
        indices.iter().for_each(|&i| stats.add(y[i]));
        let n_samples = indices.len();
        let leaf = |stats: &Stats| TreeNode::Leaf {
            value: if stats.count > 0.0 { stats.sum / stats.count } else { 0.0 },
            n_samples,
        };

        let parent_impurity = self.criterion.impurity(stats.count, stats.sum, stats.sq_sum);
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || parent_impurity <= 1e-12;
        if should_stop {
            return leaf(&stats);
        }

        let Some(best) = self.find_best_split(x, y, &indices, &stats, parent_impurity, rng) else {
            return leaf(&stats);
        };

        importances[best.feature_idx] += n_samples as f64 * best.gain;
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, best.feature_idx]] <= best.threshold);

        let left = Box::new(self.build_tree(x, y, left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        total: &Stats,
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = x.ncols();
        let candidates: Vec<usize> = match self.max_features {
            Some(k) if k < n_features => {
                let mut picked = sample(rng, n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        };

        let min_leaf = self.min_samples_leaf as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(indices.len());

        for feature_idx in candidates {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (x[[i, feature_idx]], y[i])));
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

            let mut left = Stats::default();
            for w in 0..pairs.len() - 1 {
                left.add(pairs[w].1);
                let (cur, next) = (pairs[w].0, pairs[w + 1].0);
                if !(cur < next) {
                    continue;
                }
                let right = total.minus(&left);
                if left.count < min_leaf || right.count < min_leaf {
                    continue;
                }

                let weighted = (left.count * self.criterion.impurity(left.count, left.sum, left.sq_sum)
                    + right.count * self.criterion.impurity(right.count, right.sum, right.sq_sum))
                    / total.count;
                let gain = parent_impurity - weighted;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (cur + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(PipelineError::ModelNotFitted)
    }

    /// Leaf value for every row (class-1 fraction for classifiers)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| root.predict(row)).collect())
    }

    /// Replace each leaf value with `f(rows reaching that leaf)`
    pub fn refit_leaves<F>(&mut self, x: &Array2<f64>, indices: &[usize], f: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        let root = self.root.as_mut().ok_or(PipelineError::ModelNotFitted)?;
        root.refit_leaves(x, indices, &f);
        Ok(())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_classifier_learns_threshold() {
        let (x, y) = threshold_data();
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred.to_vec(), y);
        assert_eq!(tree.depth(), 1);
        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_and_leaf_probability() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let y = vec![0.0, 1.0, 1.0, 1.0];
        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(0));
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), vec![0.75; 4]);
    }

    #[test]
    fn test_regressor_and_leaf_refit() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 10.0, 11.0]).unwrap();
        let y = vec![1.0, 1.0, 5.0, 5.0];
        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), y);

        tree.refit_leaves(&x, &[0, 1, 2, 3], |rows| rows.len() as f64 * 10.0).unwrap();
        assert_eq!(tree.predict(&x).unwrap().to_vec(), vec![20.0; 4]);
    }

    #[test]
    fn test_unfitted_and_shape_errors() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&Array2::zeros((1, 2))), Err(PipelineError::ModelNotFitted)));

        let (x, y) = threshold_data();
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();
        assert!(tree.predict(&Array2::zeros((1, 3))).is_err());
    }
}
