//! Feature engineering stage
//!
//! Fits the [`FeaturePipeline`] on the ingested training split, scores the
//! expanded features by mutual information with the target, keeps the top K
//! and writes the processed splits together with correlation and importance
//! diagnostics. The fitted pipeline is persisted so the prediction service
//! can replay exactly the same encoding.

use crate::artifacts::FeatureEngineeringArtifact;
use crate::config::{FeatureEngineeringConfig, FeatureSettings};
use crate::error::Result;
use crate::preprocessing::{correlation_matrix, FeaturePipeline, FeatureSelector};
use crate::utils::{self, frame_from_matrix, target_labels, to_feature_matrix};
use crate::visualization::{bar_chart_svg, correlation_heatmap_svg};
use ndarray::{Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Contents of the selection report JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub selected_features: Vec<String>,
    pub n_features: usize,
}

pub struct FeatureEngineering {
    config: FeatureEngineeringConfig,
    settings: FeatureSettings,
}

impl FeatureEngineering {
    pub fn new(config: FeatureEngineeringConfig, settings: FeatureSettings) -> Self {
        Self { config, settings }
    }

    pub fn engineer_features(&self) -> Result<FeatureEngineeringArtifact> {
        let train = utils::load_non_empty_csv(&self.config.train_data_path)?;
        let test = utils::load_non_empty_csv(&self.config.test_data_path)?;
        let target = self.settings.target_column.as_str();
        let labels = target_labels(&train, target)?;

        info!(train_rows = train.height(), test_rows = test.height(), "Fitting feature pipeline");
        let mut pipeline = FeaturePipeline::fit(&train, &self.settings)?;
        let x_train = pipeline.expand(&train)?;
        let x_test = pipeline.expand(&test)?;

        self.analyze_correlations(&pipeline, &train)?;

        // Without a configured K every feature is kept, but still scored
        let n_expanded = pipeline.feature_names().len();
        let k = self
            .settings
            .feature_selection
            .as_ref()
            .map_or(n_expanded, |s| s.k_best);
        let mut selector = FeatureSelector::mutual_information(k);
        selector.fit(&x_train, &labels)?;
        let selected = selector.selected_indices().unwrap_or_default().to_vec();
        let scores = selector.scores().unwrap_or_default().to_vec();
        pipeline.set_selection(selected.clone())?;

        let names = pipeline.feature_names().to_vec();
        let importance = self.save_feature_importance(&names, &scores)?;

        let selected_features = pipeline.selected_feature_names();
        utils::save_json(
            &self.config.feature_selection_report,
            &SelectionReport {
                selected_features: selected_features.clone(),
                n_features: selected_features.len(),
            },
        )?;

        let mut train_out = frame_from_matrix(&selected_features, &x_train.select(Axis(1), &selected))?;
        append_labels(&mut train_out, target, &labels)?;
        let mut test_out = frame_from_matrix(&selected_features, &x_test.select(Axis(1), &selected))?;
        if test.column(target).is_ok() {
            append_labels(&mut test_out, target, &target_labels(&test, target)?)?;
        }
        utils::save_csv(&mut train_out, &self.config.processed_train_path)?;
        utils::save_csv(&mut test_out, &self.config.processed_test_path)?;

        pipeline.save(&self.config.preprocessor_path)?;

        info!(
            expanded = n_expanded,
            selected = selected_features.len(),
            processed_train = %self.config.processed_train_path.display(),
            "Feature engineering completed"
        );

        Ok(FeatureEngineeringArtifact {
            processed_train_path: self.config.processed_train_path.clone(),
            processed_test_path: self.config.processed_test_path.clone(),
            feature_importance_plot: self.config.feature_importance_plot_path.clone(),
            correlation_matrix: self.config.correlation_matrix_path.clone(),
            feature_selection_report: self.config.feature_selection_report.clone(),
            preprocessor_path: self.config.preprocessor_path.clone(),
            selected_features,
            feature_importance_scores: importance,
        })
    }

    /// Pearson correlation over the raw (unscaled) numeric features
    fn analyze_correlations(&self, pipeline: &FeaturePipeline, train: &DataFrame) -> Result<()> {
        let derived = pipeline.derive(train)?;
        let numeric = pipeline.numeric_features().to_vec();
        let corr = correlation_matrix(&to_feature_matrix(&derived, &numeric)?);

        write_labelled_matrix(&self.config.correlation_matrix_path, &numeric, &corr)?;
        utils::save_text(
            &self.config.correlation_plot_path,
            &correlation_heatmap_svg(&numeric, &corr, "Feature Correlation Heatmap"),
        )
    }

    /// Importance CSV and bar chart, highest score first
    fn save_feature_importance(&self, names: &[String], scores: &[f64]) -> Result<BTreeMap<String, f64>> {
        let mut ranked: Vec<(&String, f64)> = names.iter().zip(scores.iter().copied()).collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let ranked_names: Vec<String> = ranked.iter().map(|(n, _)| (*n).clone()).collect();
        let ranked_scores: Vec<f64> = ranked.iter().map(|(_, s)| *s).collect();

        let mut frame = df!(
            "feature" => &ranked_names,
            "importance" => &ranked_scores
        )?;
        utils::save_csv(&mut frame, &self.config.feature_importance_path)?;
        utils::save_text(
            &self.config.feature_importance_plot_path,
            &bar_chart_svg(&ranked_names, &ranked_scores, "Feature Importance (Mutual Information)"),
        )?;

        Ok(ranked_names.into_iter().zip(ranked_scores).collect())
    }
}

fn append_labels(df: &mut DataFrame, target: &str, labels: &[f64]) -> Result<()> {
    let values: Vec<i64> = labels.iter().map(|&v| v as i64).collect();
    df.with_column(Series::new(target.into(), values))?;
    Ok(())
}

/// Square matrix as CSV whose first column holds the row labels
fn write_labelled_matrix(path: &Path, labels: &[String], matrix: &Array2<f64>) -> Result<()> {
    let mut columns: Vec<Column> = vec![Series::new("feature".into(), labels.to_vec()).into()];
    for (j, name) in labels.iter().enumerate() {
        columns.push(Series::new(name.as_str().into(), matrix.column(j).to_vec()).into());
    }
    let mut frame = DataFrame::new(columns)?;
    utils::save_csv(&mut frame, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigurationManager, ModelParams, PipelineConfig, Schema};
    use tempfile::TempDir;

    fn bank_frame(n: usize, with_target: bool) -> DataFrame {
        let jobs = ["admin.", "technician", "services", "management"];
        let months = ["may", "jun", "jul", "aug"];
        let idx: Vec<usize> = (0..n).collect();
        let y: Vec<i64> = idx.iter().map(|i| i64::from(i % 3 == 0)).collect();
        let mut df = df!(
            "id" => idx.iter().map(|&i| i as i64).collect::<Vec<_>>(),
            "age" => idx.iter().map(|&i| 20 + (i % 50) as i64).collect::<Vec<_>>(),
            "job" => idx.iter().map(|&i| jobs[i % 4]).collect::<Vec<_>>(),
            "marital" => idx.iter().map(|&i| if i % 2 == 0 { "married" } else { "single" }).collect::<Vec<_>>(),
            "education" => idx.iter().map(|&i| if i % 5 == 0 { "tertiary" } else { "secondary" }).collect::<Vec<_>>(),
            "default" => vec!["no"; n],
            "balance" => idx.iter().map(|&i| (i as i64 * 37) % 3000 - 200).collect::<Vec<_>>(),
            "housing" => idx.iter().map(|&i| if i % 3 == 0 { "yes" } else { "no" }).collect::<Vec<_>>(),
            "loan" => idx.iter().map(|&i| if i % 7 == 0 { "yes" } else { "no" }).collect::<Vec<_>>(),
            "contact" => vec!["cellular"; n],
            "day" => idx.iter().map(|&i| 1 + (i % 28) as i64).collect::<Vec<_>>(),
            "month" => idx.iter().map(|&i| months[i % 4]).collect::<Vec<_>>(),
            "duration" => idx.iter().map(|&i| if i % 3 == 0 { 600 + i as i64 } else { 100 + (i % 50) as i64 }).collect::<Vec<_>>(),
            "campaign" => idx.iter().map(|&i| 1 + (i % 4) as i64).collect::<Vec<_>>(),
            "pdays" => vec![-1i64; n],
            "previous" => vec![0i64; n],
            "poutcome" => vec!["unknown"; n]
        )
        .unwrap();
        if with_target {
            df.with_column(Series::new("y".into(), y)).unwrap();
        }
        df
    }

    fn setup(k: usize) -> (TempDir, FeatureEngineering) {
        let tmp = TempDir::new().unwrap();
        let mut config = PipelineConfig::with_root(&tmp.path().join("artifacts"), None);
        config.features.feature_selection.as_mut().unwrap().k_best = k;
        let manager = ConfigurationManager::from_parts(config, ModelParams::default(), Schema::default()).unwrap();
        let fe_config = manager.feature_engineering_config().unwrap();

        utils::save_csv(&mut bank_frame(120, true), &fe_config.train_data_path).unwrap();
        utils::save_csv(&mut bank_frame(40, false), &fe_config.test_data_path).unwrap();
        let stage = FeatureEngineering::new(fe_config, manager.feature_settings().unwrap());
        (tmp, stage)
    }

    #[test]
    fn test_engineer_features_writes_all_artifacts() {
        let (_tmp, stage) = setup(10);
        let artifact = stage.engineer_features().unwrap();

        assert_eq!(artifact.selected_features.len(), 10);
        let train = utils::load_csv(&artifact.processed_train_path).unwrap();
        assert_eq!(train.width(), 11);
        assert!(train.column("y").is_ok());
        let test = utils::load_csv(&artifact.processed_test_path).unwrap();
        assert_eq!(test.width(), 10);

        let report: SelectionReport = utils::load_json(&artifact.feature_selection_report).unwrap();
        assert_eq!(report.n_features, 10);
        assert_eq!(report.selected_features, artifact.selected_features);

        let corr = utils::load_csv(&artifact.correlation_matrix).unwrap();
        assert_eq!(utils::column_names(&corr)[0], "feature");
        assert_eq!(corr.height(), 9);

        let importance = utils::load_csv(&stage.config.feature_importance_path).unwrap();
        let scores = utils::column_f64(&importance, "importance").unwrap();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(artifact.feature_importance_plot.exists());

        let pipeline = FeaturePipeline::load(&artifact.preprocessor_path).unwrap();
        assert_eq!(pipeline.selected_feature_names(), artifact.selected_features);
    }

    #[test]
    fn test_k_larger_than_features_keeps_all() {
        let (_tmp, stage) = setup(500);
        let artifact = stage.engineer_features().unwrap();
        let pipeline = FeaturePipeline::load(&artifact.preprocessor_path).unwrap();
        assert_eq!(artifact.selected_features.len(), pipeline.feature_names().len());
    }
}
