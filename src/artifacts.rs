//! Outputs handed from one pipeline stage to the next

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::training::ModelMetrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub root_dir: PathBuf,
    pub raw_data_dir: PathBuf,
    pub train_data_dir: PathBuf,
    pub test_data_dir: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub validation_status: bool,
    pub validation_status_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub data_quality_report_file_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
    /// Columns whose KS p-value fell under the threshold
    pub drifted_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEngineeringArtifact {
    pub processed_train_path: PathBuf,
    pub processed_test_path: PathBuf,
    pub feature_importance_plot: PathBuf,
    pub correlation_matrix: PathBuf,
    pub feature_selection_report: PathBuf,
    pub preprocessor_path: PathBuf,
    pub selected_features: Vec<String>,
    pub feature_importance_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub preprocessor_object_file_path: PathBuf,
    pub feature_columns: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub stratified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub best_model_name: String,
    pub train_metric_artifact: ModelMetrics,
    pub test_metric_artifact: ModelMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    pub is_model_accepted: bool,
    pub improved_accuracy: f64,
    pub best_model_path: PathBuf,
    pub trained_model_path: PathBuf,
    pub metric_file_path: PathBuf,
    pub train_model_metric_artifact: ModelMetrics,
    /// Metrics recorded by the previous evaluation, if any
    pub best_model_metric_artifact: Option<ModelMetrics>,
}
