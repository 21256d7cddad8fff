//! Typed configuration documents and per-stage configs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::training::{GradientBoostingParams, LogisticRegressionParams, RandomForestParams};

/// Where raw data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Download from a Kaggle competition
    Kaggle,
    /// Copy from a local directory
    Local,
}

/// `data_ingestion` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub root_dir: PathBuf,
    pub raw_data_dir: PathBuf,
    pub train_data_dir: PathBuf,
    pub test_data_dir: PathBuf,
    #[serde(default = "default_source")]
    pub source: SourceKind,
    #[serde(default)]
    pub competition_name: String,
    /// Directory holding train.csv / test.csv for the local source
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    pub local_train_file: PathBuf,
    pub local_test_file: PathBuf,
    /// Stratification column; splits without it are sampled uniformly
    #[serde(default = "default_target")]
    pub target_column: String,
    #[serde(default = "default_train_size")]
    pub train_sample_size: usize,
    #[serde(default = "default_test_size")]
    pub test_sample_size: usize,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

/// `data_validation` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValidationSection {
    pub root_dir: PathBuf,
    pub validation_status_file: PathBuf,
    pub drift_report_file: PathBuf,
    pub data_quality_report_file: PathBuf,
    #[serde(default = "default_drift_threshold")]
    pub drift_p_value_threshold: f64,
    /// Halt the pipeline when schema validation fails
    #[serde(default = "default_true")]
    pub enforce: bool,
}

/// Resolved validation config: section + schema + ingestion outputs
#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub root_dir: PathBuf,
    pub validation_status_file: PathBuf,
    pub drift_report_file: PathBuf,
    pub data_quality_report_file: PathBuf,
    pub drift_p_value_threshold: f64,
    pub enforce: bool,
    pub schema: Schema,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// `feature_engineering` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEngineeringConfig {
    pub root_dir: PathBuf,
    pub engineered_features_dir: PathBuf,
    pub feature_importance_dir: PathBuf,
    pub correlation_analysis_dir: PathBuf,
    pub feature_selection_dir: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub processed_train_path: PathBuf,
    pub processed_test_path: PathBuf,
    pub feature_importance_path: PathBuf,
    pub feature_importance_plot_path: PathBuf,
    pub correlation_matrix_path: PathBuf,
    pub correlation_plot_path: PathBuf,
    pub feature_selection_report: PathBuf,
    /// Fitted encoding pipeline, reused by the prediction service
    pub preprocessor_path: PathBuf,
}

/// How the one-hot encoder treats categories it never saw during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    /// Encode as all zeros
    Ignore,
    /// Fail the transform
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    pub handle_unknown: HandleUnknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelectionSettings {
    pub k_best: usize,
}

/// `features` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub target_column: String,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub encoding: EncodingSettings,
    /// feature name -> transforms applied in order (only `log` is known)
    #[serde(default)]
    pub transformations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub feature_selection: Option<FeatureSelectionSettings>,
}

/// `data_transformation` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    pub root_dir: PathBuf,
    pub data_path: PathBuf,
    pub preprocessor_obj_file_path: PathBuf,
    #[serde(default = "default_target")]
    pub target_column: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_train_size")]
    pub train_size: usize,
    #[serde(default = "default_test_size")]
    pub test_size: usize,
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

impl DataTransformationConfig {
    pub fn train_path(&self) -> PathBuf {
        self.root_dir.join("train.csv")
    }

    pub fn test_path(&self) -> PathBuf {
        self.root_dir.join("test.csv")
    }
}

/// `model_trainer` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainerSection {
    pub root_dir: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub model_name: String,
    pub target_column: String,
    pub expected_accuracy: f64,
}

/// Resolved trainer config: section + hyperparameters
#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub root_dir: PathBuf,
    pub train_data_path: PathBuf,
    pub test_data_path: PathBuf,
    pub model_name: String,
    pub target_column: String,
    pub expected_accuracy: f64,
    pub model_params: ModelParams,
    pub tracking: TrackingConfig,
}

impl ModelTrainerConfig {
    pub fn model_path(&self) -> PathBuf {
        self.root_dir.join(&self.model_name)
    }
}

/// `model_evaluation` block of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluationSection {
    pub root_dir: PathBuf,
    pub test_data_path: PathBuf,
    pub model_path: PathBuf,
    pub metric_file_name: PathBuf,
    pub target_column: String,
    #[serde(default)]
    pub mlflow_uri: String,
}

/// Resolved evaluation config
#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    pub root_dir: PathBuf,
    pub test_data_path: PathBuf,
    pub model_path: PathBuf,
    pub metric_file_name: PathBuf,
    pub target_column: String,
    pub tracking: TrackingConfig,
}

/// Experiment-tracker settings shared by trainer and evaluation
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Empty or `file:` for local JSON runs, http(s) for an MLflow server
    pub uri: String,
    pub experiment_name: String,
    /// Directory for local runs
    pub local_dir: PathBuf,
}

/// Whole config.yaml document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub artifacts_root: PathBuf,
    #[serde(default = "default_experiment")]
    pub experiment_name: String,
    pub data_ingestion: DataIngestionConfig,
    pub data_validation: DataValidationSection,
    pub feature_engineering: FeatureEngineeringConfig,
    pub features: FeatureSettings,
    pub data_transformation: DataTransformationConfig,
    pub model_trainer: ModelTrainerSection,
    pub model_evaluation: ModelEvaluationSection,
}

impl PipelineConfig {
    /// Standard artifact layout under `root`, reading raw data from `source_dir`
    pub fn with_root(root: &Path, source_dir: Option<PathBuf>) -> Self {
        let ingest = root.join("data_ingestion");
        let validate = root.join("data_validation");
        let fe = root.join("feature_engineering");
        let transform = root.join("data_transformation");
        let trainer = root.join("model_trainer");
        let evaluation = root.join("model_evaluation");

        Self {
            artifacts_root: root.to_path_buf(),
            experiment_name: default_experiment(),
            data_ingestion: DataIngestionConfig {
                root_dir: ingest.clone(),
                raw_data_dir: ingest.join("raw"),
                train_data_dir: ingest.join("train"),
                test_data_dir: ingest.join("test"),
                source: if source_dir.is_some() { SourceKind::Local } else { SourceKind::Kaggle },
                competition_name: "playground-series-s5e8".to_string(),
                source_dir,
                local_train_file: ingest.join("train").join("train.csv"),
                local_test_file: ingest.join("test").join("test.csv"),
                target_column: default_target(),
                train_sample_size: default_train_size(),
                test_sample_size: default_test_size(),
                random_seed: default_seed(),
            },
            data_validation: DataValidationSection {
                root_dir: validate.clone(),
                validation_status_file: validate.join("status.json"),
                drift_report_file: validate.join("drift_report.html"),
                data_quality_report_file: validate.join("data_quality_report.json"),
                drift_p_value_threshold: default_drift_threshold(),
                enforce: true,
            },
            feature_engineering: FeatureEngineeringConfig {
                root_dir: fe.clone(),
                engineered_features_dir: fe.join("engineered_features"),
                feature_importance_dir: fe.join("feature_importance"),
                correlation_analysis_dir: fe.join("correlation_analysis"),
                feature_selection_dir: fe.join("feature_selection"),
                train_data_path: ingest.join("train").join("train.csv"),
                test_data_path: ingest.join("test").join("test.csv"),
                processed_train_path: fe.join("engineered_features").join("train_processed.csv"),
                processed_test_path: fe.join("engineered_features").join("test_processed.csv"),
                feature_importance_path: fe.join("feature_importance").join("feature_importance.csv"),
                feature_importance_plot_path: fe.join("feature_importance").join("feature_importance.svg"),
                correlation_matrix_path: fe.join("correlation_analysis").join("correlation_matrix.csv"),
                correlation_plot_path: fe.join("correlation_analysis").join("correlation_heatmap.svg"),
                feature_selection_report: fe.join("feature_selection").join("selection_report.json"),
                preprocessor_path: fe.join("preprocessor.bin"),
            },
            features: FeatureSettings::bank_marketing(),
            data_transformation: DataTransformationConfig {
                root_dir: transform.clone(),
                data_path: fe.join("engineered_features").join("train_processed.csv"),
                preprocessor_obj_file_path: transform.join("preprocessor.bin"),
                target_column: default_target(),
                id_column: default_id_column(),
                train_size: default_train_size(),
                test_size: default_test_size(),
                random_seed: default_seed(),
            },
            model_trainer: ModelTrainerSection {
                root_dir: trainer.clone(),
                train_data_path: transform.join("train.csv"),
                test_data_path: transform.join("test.csv"),
                model_name: "model.bin".to_string(),
                target_column: default_target(),
                expected_accuracy: 0.6,
            },
            model_evaluation: ModelEvaluationSection {
                root_dir: evaluation.clone(),
                test_data_path: transform.join("test.csv"),
                model_path: trainer.join("model.bin"),
                metric_file_name: evaluation.join("metrics.json"),
                target_column: default_target(),
                mlflow_uri: String::new(),
            },
        }
    }
}

impl FeatureSettings {
    /// Feature lists of the bank-marketing dataset
    pub fn bank_marketing() -> Self {
        let mut transformations = BTreeMap::new();
        transformations.insert("balance".to_string(), vec!["log".to_string()]);
        transformations.insert("duration".to_string(), vec!["log".to_string()]);

        Self {
            target_column: default_target(),
            numeric_features: [
                "age", "balance", "day", "duration", "campaign", "pdays", "previous",
                "balance_log", "duration_log",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            categorical_features: [
                "job", "marital", "education", "default", "housing", "loan", "contact",
                "month", "poutcome",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            encoding: EncodingSettings {
                handle_unknown: HandleUnknown::Ignore,
            },
            transformations,
            feature_selection: Some(FeatureSelectionSettings { k_best: 30 }),
        }
    }
}

/// params.yaml: one hyperparameter set per candidate family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(rename = "RandomForest", default)]
    pub random_forest: RandomForestParams,
    #[serde(rename = "LogisticRegression", default)]
    pub logistic_regression: LogisticRegressionParams,
    #[serde(rename = "GradientBoosting", default)]
    pub gradient_boosting: GradientBoostingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetColumn {
    pub name: String,
}

/// schema.yaml: expected column dtypes and the target column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "COLUMNS")]
    pub columns: BTreeMap<String, String>,
    #[serde(rename = "TARGET_COLUMN")]
    pub target_column: TargetColumn,
}

impl Schema {
    pub fn target(&self) -> &str {
        &self.target_column.name
    }
}

impl Default for Schema {
    fn default() -> Self {
        let columns = [
            ("id", "int64"),
            ("age", "int64"),
            ("job", "object"),
            ("marital", "object"),
            ("education", "object"),
            ("default", "object"),
            ("balance", "int64"),
            ("housing", "object"),
            ("loan", "object"),
            ("contact", "object"),
            ("day", "int64"),
            ("month", "object"),
            ("duration", "int64"),
            ("campaign", "int64"),
            ("pdays", "int64"),
            ("previous", "int64"),
            ("poutcome", "object"),
            ("y", "int64"),
        ];

        Self {
            columns: columns
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            target_column: TargetColumn { name: default_target() },
        }
    }
}

fn default_source() -> SourceKind {
    SourceKind::Kaggle
}

fn default_train_size() -> usize {
    10_000
}

fn default_test_size() -> usize {
    2_500
}

fn default_seed() -> u64 {
    42
}

fn default_drift_threshold() -> f64 {
    0.05
}

fn default_true() -> bool {
    true
}

fn default_target() -> String {
    "y".to_string()
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_experiment() -> String {
    "bank-term-deposit".to_string()
}
