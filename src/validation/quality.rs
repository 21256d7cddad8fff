//! Per-split data quality summary

use crate::error::Result;
use crate::utils::{column_f64, column_names, data_loader, is_numeric_dtype};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics of one numeric column (NaN-skipping, sample std)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return None;
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let std = if present.len() > 1 {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { mean, std, min, max })
    }
}

/// Shape, missingness, duplicates and numeric stats of one split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub shape: [usize; 2],
    pub missing_values: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    pub numeric_stats: BTreeMap<String, NumericStats>,
}

impl QualityReport {
    pub fn compute(df: &DataFrame) -> Result<Self> {
        let mut missing_values = BTreeMap::new();
        let mut numeric_stats = BTreeMap::new();

        for name in column_names(df) {
            let column = df.column(&name)?;
            missing_values.insert(name.clone(), column.null_count());
            if is_numeric_dtype(column.dtype()) {
                if let Some(stats) = NumericStats::from_values(&column_f64(df, &name)?) {
                    numeric_stats.insert(name, stats);
                }
            }
        }

        Ok(Self {
            shape: [df.height(), df.width()],
            missing_values,
            duplicate_rows: data_loader::duplicate_row_count(df)?,
            numeric_stats,
        })
    }

    pub fn total_missing(&self) -> usize {
        self.missing_values.values().sum()
    }
}

/// Quality reports for both splits, as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityDocument {
    pub train: QualityReport,
    pub test: QualityReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_numeric_stats() {
        let stats = NumericStats::from_values(&[1.0, 2.0, 3.0, 4.0, f64::NAN]).unwrap();
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert!((stats.std - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!(NumericStats::from_values(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_quality_report() {
        let df = df!(
            "age" => &[Some(30i64), None, Some(30)],
            "job" => &["a", "b", "a"]
        )
        .unwrap();
        let report = QualityReport::compute(&df).unwrap();
        assert_eq!(report.shape, [3, 2]);
        assert_eq!(report.missing_values["age"], 1);
        assert_eq!(report.total_missing(), 1);
        assert_eq!(report.duplicate_rows, 1);
        assert!(report.numeric_stats.contains_key("age"));
        assert!(!report.numeric_stats.contains_key("job"));
    }
}
