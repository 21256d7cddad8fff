//! Two-sample Kolmogorov-Smirnov drift test

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// KS outcome for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub ks_statistic: f64,
    pub p_value: f64,
    pub drift_detected: bool,
}

/// Two-sample KS test; drift is flagged when the p-value is below `alpha`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KolmogorovSmirnovTest {
    alpha: f64,
}

impl Default for KolmogorovSmirnovTest {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl KolmogorovSmirnovTest {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Largest distance between the two empirical CDFs (NaNs skipped)
    pub fn statistic(reference: &[f64], current: &[f64]) -> Result<(f64, usize, usize)> {
        let mut a: Vec<f64> = reference.iter().copied().filter(|v| !v.is_nan()).collect();
        let mut b: Vec<f64> = current.iter().copied().filter(|v| !v.is_nan()).collect();
        if a.is_empty() || b.is_empty() {
            return Err(PipelineError::Validation("KS test needs two non-empty samples".to_string()));
        }
        a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
        b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

        let (n1, n2) = (a.len(), b.len());
        let (mut i, mut j) = (0usize, 0usize);
        let mut d = 0.0f64;

        // Merge walk; ties advance both sides before measuring
        while i < n1 && j < n2 {
            let x = a[i].min(b[j]);
            while i < n1 && a[i] <= x {
                i += 1;
            }
            while j < n2 && b[j] <= x {
                j += 1;
            }
            let diff = (i as f64 / n1 as f64 - j as f64 / n2 as f64).abs();
            d = d.max(diff);
        }

        Ok((d, n1, n2))
    }

    /// Asymptotic two-sided p-value with the Stephens small-sample correction
    pub fn p_value(d: f64, n1: usize, n2: usize) -> f64 {
        let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        kolmogorov_survival((en + 0.12 + 0.11 / en) * d)
    }

    pub fn test(&self, reference: &[f64], current: &[f64]) -> Result<ColumnDrift> {
        let (d, n1, n2) = Self::statistic(reference, current)?;
        let p_value = Self::p_value(d, n1, n2);
        Ok(ColumnDrift {
            ks_statistic: d,
            p_value,
            drift_detected: p_value < self.alpha,
        })
    }
}

/// Q_KS(lambda) = 2 * sum_{k>=1} (-1)^(k-1) exp(-2 k^2 lambda^2)
fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-6;
    const EPS2: f64 = 1e-16;

    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut term_prev = 0.0f64;

    for k in 1..=100 {
        let kf = k as f64;
        let term = fac * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= EPS1 * term_prev || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        term_prev = term.abs();
    }
    // Series failed to converge: lambda is tiny, distributions indistinguishable
    1.0
}
