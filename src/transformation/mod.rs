//! Data transformation stage
//!
//! Second normalisation pass over the engineered features followed by the
//! fixed-size (stratified where possible) train/test split consumed by the
//! trainer.

use crate::artifacts::DataTransformationArtifact;
use crate::config::DataTransformationConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::StandardScaler;
use crate::utils::{self, column_names, fixed_size_split, frame_from_matrix, target_labels, to_feature_matrix};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    pub fn initiate_data_transformation(&self) -> Result<DataTransformationArtifact> {
        let mut df = utils::load_non_empty_csv(&self.config.data_path)?;
        if df.column(&self.config.id_column).is_ok() {
            df = df.drop(&self.config.id_column)?;
        }

        let target = self.config.target_column.as_str();
        let labels = target_labels(&df, target)?;
        let features: Vec<String> = column_names(&df).into_iter().filter(|c| c != target).collect();
        if features.is_empty() {
            return Err(PipelineError::Data("no feature columns left to transform".to_string()));
        }

        let x = to_feature_matrix(&df, &features)?;
        let scaler = StandardScaler::fit_matrix(&x, &features)?;
        let scaled = scaler.transform_matrix(&x)?;

        let split = fixed_size_split(&labels, self.config.train_size, self.config.test_size, self.config.random_seed)?;
        info!(
            rows = df.height(),
            features = features.len(),
            train = split.train.len(),
            test = split.test.len(),
            stratified = split.stratified,
            "Split transformed data"
        );

        let train_path = self.config.train_path();
        let test_path = self.config.test_path();
        write_split(&train_path, &features, &scaled, &labels, &split.train, target)?;
        write_split(&test_path, &features, &scaled, &labels, &split.test, target)?;
        utils::save_bin(&self.config.preprocessor_obj_file_path, &scaler)?;

        Ok(DataTransformationArtifact {
            transformed_train_file_path: train_path,
            transformed_test_file_path: test_path,
            preprocessor_object_file_path: self.config.preprocessor_obj_file_path.clone(),
            feature_columns: features,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            stratified: split.stratified,
        })
    }
}

fn write_split(
    path: &Path,
    features: &[String],
    x: &Array2<f64>,
    labels: &[f64],
    rows: &[usize],
    target: &str,
) -> Result<()> {
    let mut frame = frame_from_matrix(features, &x.select(Axis(0), rows))?;
    let y: Vec<i64> = rows.iter().map(|&i| labels[i] as i64).collect();
    frame.with_column(Series::new(target.into(), y))?;
    utils::save_csv(&mut frame, path)
}
