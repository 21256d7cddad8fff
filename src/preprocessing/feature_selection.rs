//! Mutual-information scoring, top-K selection and correlation helpers

use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scores every feature against class labels and keeps the K best
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    k: usize,
    feature_scores: Option<Vec<f64>>,
    selected_features: Option<Vec<usize>>,
}

impl FeatureSelector {
    pub fn mutual_information(k: usize) -> Self {
        Self {
            k,
            feature_scores: None,
            selected_features: None,
        }
    }

    /// Score each column of `x` against `y` (0/1 labels)
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let classes: Vec<usize> = y.iter().map(|&v| if v >= 0.5 { 1 } else { 0 }).collect();

        let scores: Vec<f64> = (0..x.ncols())
            .into_par_iter()
            .map(|j| Self::compute_mutual_information(x.column(j), &classes))
            .collect();

        self.selected_features = Some(top_k(&scores, self.k));
        self.feature_scores = Some(scores);
        Ok(())
    }

    /// Selected column indices, best first
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    // Histogram MI estimate between one feature and the class labels
    fn compute_mutual_information(x: ArrayView1<f64>, classes: &[usize]) -> f64 {
        let n = x.len() as f64;
        if n < 2.0 {
            return 0.0;
        }

        let n_bins = ((n.sqrt()) as usize).clamp(2, 20);
        let x_bins = Self::discretize(x, n_bins);

        let mut joint_counts: HashMap<(usize, usize), usize> = HashMap::new();
        let mut x_counts: HashMap<usize, usize> = HashMap::new();
        let mut y_counts: HashMap<usize, usize> = HashMap::new();

        for (&xb, &yb) in x_bins.iter().zip(classes) {
            *joint_counts.entry((xb, yb)).or_insert(0) += 1;
            *x_counts.entry(xb).or_insert(0) += 1;
            *y_counts.entry(yb).or_insert(0) += 1;
        }

        let mut mi = 0.0;
        for (&(xb, yb), &count) in &joint_counts {
            let p_xy = count as f64 / n;
            let p_x = x_counts.get(&xb).copied().unwrap_or(0) as f64 / n;
            let p_y = y_counts.get(&yb).copied().unwrap_or(0) as f64 / n;
            if p_xy > 0.0 && p_x > 0.0 && p_y > 0.0 {
                mi += p_xy * (p_xy / (p_x * p_y)).ln();
            }
        }

        mi.max(0.0)
    }

    // Equal-width bins; NaNs share the first bin
    fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
        let present = x.iter().copied().filter(|v| !v.is_nan());
        let (min_val, max_val) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        let range = max_val - min_val;
        if !range.is_finite() || range <= 0.0 {
            return vec![0; x.len()];
        }

        let bin_width = range / n_bins as f64;
        x.iter()
            .map(|&v| {
                if v.is_nan() {
                    0
                } else {
                    (((v - min_val) / bin_width) as usize).min(n_bins - 1)
                }
            })
            .collect()
    }
}

/// Indices of the `k` highest scores, best first; ties keep the lower index
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    // sort_by is stable
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.into_iter().take(k.min(scores.len())).map(|(i, _)| i).collect()
}

/// Pearson correlation, 0 when either side is constant
pub fn pearson_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    let n = pairs.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let x_mean = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let y_mean = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut x_var, mut y_var) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        cov += (a - x_mean) * (b - y_mean);
        x_var += (a - x_mean).powi(2);
        y_var += (b - y_mean).powi(2);
    }

    if x_var <= 0.0 || y_var <= 0.0 {
        return 0.0;
    }
    cov / (x_var.sqrt() * y_var.sqrt())
}

/// Symmetric correlation matrix over the columns of `x`
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let p = x.ncols();
    let mut corr = Array2::<f64>::eye(p);
    for i in 0..p {
        for j in (i + 1)..p {
            let r = pearson_correlation(x.column(i), x.column(j));
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}
