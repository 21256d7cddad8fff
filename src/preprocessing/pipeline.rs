//! Fitted feature pipeline: derived columns, scaling, one-hot encoding, selection

use super::encoder::OneHotEncoder;
use super::scaler::StandardScaler;
use super::transforms::{fit_transforms, ColumnTransform};
use crate::config::FeatureSettings;
use crate::error::{PipelineError, Result};
use crate::utils;
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Everything needed to turn a raw bank record frame into model features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePipeline {
    target_column: String,
    numeric_features: Vec<String>,
    categorical_features: Vec<String>,
    transforms: Vec<ColumnTransform>,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    /// Numeric names followed by `column_value` names
    feature_names: Vec<String>,
    /// Indices into `feature_names`, in output order
    selected: Vec<usize>,
}

impl FeaturePipeline {
    /// Fit on the training split; selection starts as "keep everything"
    pub fn fit(train: &DataFrame, settings: &FeatureSettings) -> Result<Self> {
        let start = Instant::now();
        let transforms = fit_transforms(train, &settings.transformations)?;
        let derived = apply_transforms(&transforms, train)?;

        let missing: Vec<&String> = settings
            .numeric_features
            .iter()
            .chain(&settings.categorical_features)
            .filter(|c| derived.column(c).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Schema(format!("feature columns not found: {:?}", missing)));
        }

        let scaler = StandardScaler::fit(&derived, &settings.numeric_features)?;
        let encoder = OneHotEncoder::fit(&derived, &settings.categorical_features, settings.encoding.handle_unknown)?;

        let mut feature_names = settings.numeric_features.clone();
        feature_names.extend(encoder.feature_names());
        let selected = (0..feature_names.len()).collect();

        debug!(
            n_features = feature_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted feature pipeline"
        );

        Ok(Self {
            target_column: settings.target_column.clone(),
            numeric_features: settings.numeric_features.clone(),
            categorical_features: settings.categorical_features.clone(),
            transforms,
            scaler,
            encoder,
            feature_names,
            selected,
        })
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Raw input columns the pipeline reads
    pub fn input_columns(&self) -> Vec<String> {
        let derived: Vec<String> = self.transforms.iter().map(|t| t.output_name()).collect();
        self.numeric_features
            .iter()
            .filter(|c| !derived.contains(c))
            .chain(&self.categorical_features)
            .cloned()
            .chain(self.transforms.iter().map(|t| t.source.clone()))
            .fold(Vec::new(), |mut acc, c| {
                if !acc.contains(&c) {
                    acc.push(c);
                }
                acc
            })
    }

    pub fn numeric_features(&self) -> &[String] {
        &self.numeric_features
    }

    /// All expanded feature names, before selection
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn selected_indices(&self) -> &[usize] {
        &self.selected
    }

    pub fn selected_feature_names(&self) -> Vec<String> {
        self.selected.iter().map(|&i| self.feature_names[i].clone()).collect()
    }

    /// Restrict output to `indices` of the expanded feature list
    pub fn set_selection(&mut self, indices: Vec<usize>) -> Result<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.feature_names.len()) {
            return Err(PipelineError::ShapeError {
                expected: format!("index < {}", self.feature_names.len()),
                actual: bad.to_string(),
            });
        }
        self.selected = indices;
        Ok(())
    }

    /// Frame with the derived columns appended
    pub fn derive(&self, df: &DataFrame) -> Result<DataFrame> {
        apply_transforms(&self.transforms, df)
    }

    /// Full expanded matrix (scaled numerics then one-hot block)
    pub fn expand(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let derived = self.derive(df)?;
        let numeric = self.scaler.transform_frame(&derived)?;
        let categorical = self.encoder.transform(&derived)?;
        Ok(concatenate(Axis(1), &[numeric.view(), categorical.view()])?)
    }

    /// Expanded matrix restricted to the selected features
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        Ok(self.expand(df)?.select(Axis(1), &self.selected))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        utils::save_bin(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        utils::load_bin(path)
    }
}

fn apply_transforms(transforms: &[ColumnTransform], df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for transform in transforms {
        transform.apply(&mut out)?;
    }
    Ok(out)
}
