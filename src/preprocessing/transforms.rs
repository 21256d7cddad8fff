//! Declarative per-feature transforms that derive new columns
//!
//! `transformations: {balance: [log]}` adds `balance_log`. Shifts are fitted
//! on the training split and reused unchanged for every later frame, so
//! test and serving rows land on the same scale as training rows.

use crate::error::{PipelineError, Result};
use crate::utils::{column_f64, data_loader::with_f64_column};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Known transform names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformType {
    /// ln(1 + (x - min + 1)), shifted so the fitted minimum maps to ln 2
    Log,
}

impl TransformType {
    fn suffix(&self) -> &'static str {
        match self {
            TransformType::Log => "log",
        }
    }
}

impl FromStr for TransformType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" | "log1p" => Ok(TransformType::Log),
            other => Err(PipelineError::Config(format!("unknown transform '{}'", other))),
        }
    }
}

/// One fitted derived column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransform {
    pub source: String,
    pub transform: TransformType,
    /// Training minimum of `source`
    pub fitted_min: f64,
}

impl ColumnTransform {
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.source, self.transform.suffix())
    }

    pub fn apply_value(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        match self.transform {
            TransformType::Log => (x - self.fitted_min + 1.0).max(-1.0 + f64::EPSILON).ln_1p(),
        }
    }

    /// Append the derived column to `df`
    pub fn apply(&self, df: &mut DataFrame) -> Result<()> {
        let values: Vec<f64> = column_f64(df, &self.source)?
            .into_iter()
            .map(|x| self.apply_value(x))
            .collect();
        with_f64_column(df, &self.output_name(), values)
    }
}

/// Fit every declared transform whose source column exists in `df`
pub fn fit_transforms(df: &DataFrame, declared: &BTreeMap<String, Vec<String>>) -> Result<Vec<ColumnTransform>> {
    let mut fitted = Vec::new();
    for (feature, names) in declared {
        if df.column(feature).is_err() {
            continue;
        }
        let values = column_f64(df, feature)?;
        let fitted_min = values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::INFINITY, f64::min);
        let fitted_min = if fitted_min.is_finite() { fitted_min } else { 0.0 };

        for name in names {
            fitted.push(ColumnTransform {
                source: feature.clone(),
                transform: name.parse()?,
                fitted_min,
            });
        }
    }
    Ok(fitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn declared() -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert("balance".to_string(), vec!["log".to_string()]);
        map.insert("absent".to_string(), vec!["log".to_string()]);
        map
    }

    #[test]
    fn test_log_uses_training_minimum() {
        let train = df!("balance" => &[-100i64, 0, 900]).unwrap();
        let transforms = fit_transforms(&train, &declared()).unwrap();
        assert_eq!(transforms.len(), 1);
        assert_eq!(transforms[0].output_name(), "balance_log");

        let mut test = df!("balance" => &[-100i64, 50]).unwrap();
        transforms[0].apply(&mut test).unwrap();
        let logged = column_f64(&test, "balance_log").unwrap();
        assert!((logged[0] - 2.0f64.ln()).abs() < 1e-12);
        assert!((logged[1] - 152.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let train = df!("balance" => &[1i64]).unwrap();
        let mut map = BTreeMap::new();
        map.insert("balance".to_string(), vec!["sqrt".to_string()]);
        assert!(matches!(fit_transforms(&train, &map), Err(PipelineError::Config(_))));
    }
}
