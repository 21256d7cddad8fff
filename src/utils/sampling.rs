//! Seeded row sampling and train/test splitting

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Group row positions by class label (labels are 0/1 but any value works)
fn class_groups(labels: &[f64], rows: &[usize]) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        groups.entry(labels[row].round() as i64).or_default().push(row);
    }
    groups
}

/// Whether every class has at least two rows and there is more than one class
pub fn can_stratify(labels: &[f64]) -> bool {
    let rows: Vec<usize> = (0..labels.len()).collect();
    let groups = class_groups(labels, &rows);
    groups.len() > 1 && groups.values().all(|g| g.len() >= 2)
}

/// Per-class quotas summing to `n`, proportional to class size.
/// Remainders go to the largest fractional parts, ties to the lower label.
fn allocate(groups: &BTreeMap<i64, Vec<usize>>, n: usize) -> Vec<usize> {
    let total: usize = groups.values().map(Vec::len).sum();
    if total == 0 {
        return vec![0; groups.len()];
    }

    let exact: Vec<f64> = groups
        .values()
        .map(|g| n as f64 * g.len() as f64 / total as f64)
        .collect();
    let mut quotas: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut remaining = n.saturating_sub(quotas.iter().sum());

    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    while remaining > 0 {
        let mut progressed = false;
        for &i in &order {
            if remaining == 0 {
                break;
            }
            if quotas[i] < sizes[i] {
                quotas[i] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    quotas
}

/// Split `rows` into (`n_first` rows, the rest), preserving class ratios
fn stratified_partition(
    labels: &[f64],
    rows: &[usize],
    n_first: usize,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let groups = class_groups(labels, rows);
    let quotas = allocate(&groups, n_first.min(rows.len()));

    let mut first = Vec::with_capacity(n_first);
    let mut rest = Vec::with_capacity(rows.len().saturating_sub(n_first));
    for (group, quota) in groups.into_values().zip(quotas) {
        let mut group = group;
        group.shuffle(rng);
        let (taken, left) = group.split_at(quota.min(group.len()));
        first.extend_from_slice(taken);
        rest.extend_from_slice(left);
    }
    first.shuffle(rng);
    rest.shuffle(rng);
    (first, rest)
}

fn uniform_partition(rows: &[usize], n_first: usize, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let mut shuffled = rows.to_vec();
    shuffled.shuffle(rng);
    let split = n_first.min(shuffled.len());
    let rest = shuffled.split_off(split);
    (shuffled, rest)
}

/// Pick `n` row positions, stratified on `labels`
pub fn stratified_sample(labels: &[f64], n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<usize> = (0..labels.len()).collect();
    stratified_partition(labels, &rows, n, &mut rng).0
}

/// Pick `n` of `len` row positions uniformly
pub fn uniform_sample(len: usize, n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<usize> = (0..len).collect();
    uniform_partition(&rows, n, &mut rng).0
}

/// Row positions of a train/test split
#[derive(Debug, Clone)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// Fixed-size train/test split.
///
/// With enough rows, `train_size` rows are drawn first and `test_size` rows
/// from the remainder (or the whole remainder when it is smaller). With fewer
/// than `train_size + test_size` rows the data is split proportionally
/// instead. Stratification on `labels` is dropped when a class is too small.
pub fn fixed_size_split(labels: &[f64], train_size: usize, test_size: usize, seed: u64) -> Result<SplitIndices> {
    let n = labels.len();
    if n < 2 {
        return Err(PipelineError::Data(format!("cannot split {} rows", n)));
    }
    if train_size == 0 || test_size == 0 {
        return Err(PipelineError::Config("train and test sizes must be positive".to_string()));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let stratified = can_stratify(labels);
    let rows: Vec<usize> = (0..n).collect();
    let needed = train_size + test_size;

    let partition = |rows: &[usize], k: usize, rng: &mut ChaCha8Rng| {
        if stratified {
            stratified_partition(labels, rows, k, rng)
        } else {
            uniform_partition(rows, k, rng)
        }
    };

    let (train, test) = if n < needed {
        let train_ratio = train_size as f64 / needed as f64;
        let n_train = ((n as f64 * train_ratio).floor() as usize).clamp(1, n - 1);
        partition(&rows, n_train, &mut rng)
    } else {
        let (train, remainder) = partition(&rows, train_size, &mut rng);
        let test = if remainder.len() > test_size {
            partition(&remainder, test_size, &mut rng).0
        } else {
            remainder
        };
        (train, test)
    };

    Ok(SplitIndices { train, test, stratified })
}
