//! One-hot encoding of categorical columns

use crate::config::HandleUnknown;
use crate::error::{PipelineError, Result};
use crate::utils::column_strings;
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted categories observed for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    pub categories: Vec<String>,
}

impl ColumnCategories {
    fn position(&self, value: &str) -> Option<usize> {
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<ColumnCategories>,
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    pub fn fit(df: &DataFrame, columns: &[String], handle_unknown: HandleUnknown) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|name| {
                let categories: BTreeSet<String> = column_strings(df, name)?.into_iter().collect();
                Ok(ColumnCategories {
                    column: name.clone(),
                    categories: categories.into_iter().collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns, handle_unknown })
    }

    /// Output width: one slot per (column, category)
    pub fn n_outputs(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    /// `column_value` per output slot
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| c.categories.iter().map(move |v| format!("{}_{}", c.column, v)))
            .collect()
    }

    pub fn categories(&self) -> &[ColumnCategories] {
        &self.columns
    }

    /// Encode the fitted columns of `df`
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((df.height(), self.n_outputs()));
        let mut offset = 0;

        for cats in &self.columns {
            let values = column_strings(df, &cats.column)?;
            for (row, value) in values.iter().enumerate() {
                match cats.position(value) {
                    Some(pos) => out[[row, offset + pos]] = 1.0,
                    None if self.handle_unknown == HandleUnknown::Error => {
                        return Err(PipelineError::Data(format!(
                            "unknown category '{}' in column '{}'",
                            value, cats.column
                        )));
                    }
                    None => {}
                }
            }
            offset += cats.categories.len();
        }

        Ok(out)
    }
}
