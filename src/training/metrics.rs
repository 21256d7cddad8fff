//! Binary classification metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The five metrics written to metrics.json
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Support-weighted over classes
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
}

impl ModelMetrics {
    /// Compute all metrics; without usable probabilities `auc` is `None`
    /// and the caller decides the fallback
    pub fn compute(y_true: &[f64], y_pred: &[f64], y_prob: Option<&[f64]>) -> (Self, Option<f64>) {
        let (precision, recall, f1) = weighted_precision_recall_f1(y_true, y_pred);
        let auc = y_prob.and_then(|p| roc_auc(y_true, p));
        let metrics = Self {
            accuracy: accuracy(y_true, y_pred),
            precision,
            recall,
            f1,
            auc: auc.unwrap_or(0.5),
        };
        (metrics, auc)
    }
}

fn is_positive(v: f64) -> bool {
    v > 0.5
}

pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| is_positive(**t) == is_positive(**p))
        .count();
    correct as f64 / y_true.len() as f64
}

/// Per-class precision/recall/F1 averaged with weights equal to each class's
/// support in `y_true`
pub fn weighted_precision_recall_f1(y_true: &[f64], y_pred: &[f64]) -> (f64, f64, f64) {
    // class -> (tp, predicted, support)
    let mut counts: BTreeMap<bool, (usize, usize, usize)> = BTreeMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        let (t, p) = (is_positive(t), is_positive(p));
        counts.entry(t).or_default().2 += 1;
        let entry = counts.entry(p).or_default();
        entry.1 += 1;
        if t == p {
            entry.0 += 1;
        }
    }

    let total = y_true.len() as f64;
    if total == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for &(tp, predicted, support) in counts.values() {
        if support == 0 {
            continue;
        }
        let weight = support as f64 / total;
        let p = ratio(tp, predicted);
        let r = ratio(tp, support);
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    (precision, recall, f1)
}

pub fn weighted_f1(y_true: &[f64], y_pred: &[f64]) -> f64 {
    weighted_precision_recall_f1(y_true, y_pred).2
}

/// ROC AUC via the Mann-Whitney U statistic with average ranks for ties.
/// `None` when only one class is present.
pub fn roc_auc(y_true: &[f64], scores: &[f64]) -> Option<f64> {
    if y_true.len() != scores.len() || scores.iter().any(|s| s.is_nan()) {
        return None;
    }
    let n_pos = y_true.iter().filter(|v| is_positive(**v)).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| is_positive(**t))
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_and_weighted_scores() {
        let y_true = [1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = [1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        assert!((accuracy(&y_true, &y_pred) - 0.75).abs() < 1e-12);

        // Balanced classes, each with precision = recall = 0.75
        let (p, r, f) = weighted_precision_recall_f1(&y_true, &y_pred);
        assert!((p - 0.75).abs() < 1e-12);
        assert!((r - 0.75).abs() < 1e-12);
        assert!((f - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_scores_follow_support() {
        // class 0: support 3, predicted 4, tp 3 -> p 0.75 r 1.0
        // class 1: support 1, predicted 0       -> p 0.0  r 0.0
        let y_true = [0.0, 0.0, 0.0, 1.0];
        let y_pred = [0.0, 0.0, 0.0, 0.0];
        let (p, r, _) = weighted_precision_recall_f1(&y_true, &y_pred);
        assert!((p - 0.5625).abs() < 1e-12);
        assert!((r - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc() {
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &[0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.3, 0.4]), Some(1.0));
        assert_eq!(roc_auc(&y, &[0.5, 0.5, 0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&[1.0, 1.0], &[0.2, 0.9]), None);
    }

    #[test]
    fn test_compute_auc_fallback() {
        let (metrics, auc) = ModelMetrics::compute(&[1.0, 1.0], &[1.0, 0.0], Some(&[0.9, 0.2]));
        assert!(auc.is_none());
        assert_eq!(metrics.auc, 0.5);
        assert_eq!(metrics.accuracy, 0.5);
    }
}
