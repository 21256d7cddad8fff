//! Standard scaling bound to an ordered column list

use crate::error::{PipelineError, Result};
use crate::utils::column_f64;
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-column centre and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

impl ScalerParams {
    /// Population mean/std over the non-NaN values
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let present: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return Self { center: 0.0, scale: 1.0 };
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let std = (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }

    /// Missing values land on the column mean
    fn apply(&self, v: f64) -> f64 {
        if v.is_nan() {
            0.0
        } else {
            (v - self.center) / self.scale
        }
    }
}

/// z-score scaler; the column order it was fitted with is part of its contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
}

impl StandardScaler {
    /// Fit on the named frame columns
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let params = columns
            .iter()
            .map(|c| Ok(ScalerParams::from_values(column_f64(df, c)?.into_iter())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns: columns.to_vec(), params })
    }

    /// Fit on matrix columns named by `columns`
    pub fn fit_matrix(x: &Array2<f64>, columns: &[String]) -> Result<Self> {
        if columns.len() != x.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let params = x
            .columns()
            .into_iter()
            .map(|col: ArrayView1<f64>| ScalerParams::from_values(col.iter().copied()))
            .collect();
        Ok(Self { columns: columns.to_vec(), params })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Scale a matrix whose columns follow `columns()`
    pub fn transform_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.params.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let mut out = x.clone();
        for (mut col, params) in out.columns_mut().into_iter().zip(&self.params) {
            col.mapv_inplace(|v| params.apply(v));
        }
        Ok(out)
    }

    /// Scale the fitted columns of a frame, returned in fitted order
    pub fn transform_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let x = crate::utils::to_feature_matrix(df, &self.columns)?;
        self.transform_matrix(&x)
    }

    /// Scale one row in fitted order
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.params.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} values", self.params.len()),
                actual: format!("{} values", row.len()),
            });
        }
        Ok(row.iter().zip(&self.params).map(|(&v, p)| p.apply(v)).collect())
    }
}
