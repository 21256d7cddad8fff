//! Configuration resolver
//!
//! Reads the three YAML documents (pipeline paths/params, hyperparameters,
//! column schema) and hands out typed per-stage configs. Every directory a
//! stage writes into is created when its config is requested.

mod entity;

pub use entity::*;

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.yaml";
pub const PARAMS_FILE: &str = "params.yaml";
pub const SCHEMA_FILE: &str = "schema.yaml";

/// Parse a YAML file into `T`
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    if content.trim().is_empty() {
        return Err(PipelineError::Config(format!("{} is empty", path.display())));
    }
    let value = serde_yaml::from_str(&content)?;
    debug!(path = %path.display(), "Loaded YAML document");
    Ok(value)
}

/// Create each directory (and parents) if missing
pub fn create_directories<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir.as_ref())?;
        debug!(dir = %dir.as_ref().display(), "Created directory");
    }
    Ok(())
}

fn parent_dirs(paths: &[&PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// Resolves config documents into stage configs
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: PipelineConfig,
    params: ModelParams,
    schema: Schema,
}

impl ConfigurationManager {
    /// Load `config.yaml`, `params.yaml` and `schema.yaml` from `dir`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::from_files(&dir.join(CONFIG_FILE), &dir.join(PARAMS_FILE), &dir.join(SCHEMA_FILE))
    }

    pub fn from_files(config_path: &Path, params_path: &Path, schema_path: &Path) -> Result<Self> {
        let config: PipelineConfig = read_yaml(config_path)?;
        let params: ModelParams = read_yaml(params_path)?;
        let schema: Schema = read_yaml(schema_path)?;
        info!(
            config = %config_path.display(),
            params = %params_path.display(),
            schema = %schema_path.display(),
            "Configuration loaded"
        );
        Self::from_parts(config, params, schema)
    }

    /// Build from already-parsed documents
    pub fn from_parts(config: PipelineConfig, params: ModelParams, schema: Schema) -> Result<Self> {
        if schema.columns.is_empty() {
            return Err(PipelineError::Config("schema declares no columns".to_string()));
        }
        create_directories(&[&config.artifacts_root])?;
        Ok(Self { config, params, schema })
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn data_ingestion_config(&self) -> Result<DataIngestionConfig> {
        let config = self.config.data_ingestion.clone();
        create_directories(&[
            &config.root_dir,
            &config.raw_data_dir,
            &config.train_data_dir,
            &config.test_data_dir,
        ])?;
        Ok(config)
    }

    pub fn data_validation_config(&self) -> Result<DataValidationConfig> {
        let section = &self.config.data_validation;
        let ingestion = &self.config.data_ingestion;
        create_directories(&[&section.root_dir])?;
        create_directories(&parent_dirs(&[
            &section.validation_status_file,
            &section.drift_report_file,
            &section.data_quality_report_file,
        ]))?;

        Ok(DataValidationConfig {
            root_dir: section.root_dir.clone(),
            validation_status_file: section.validation_status_file.clone(),
            drift_report_file: section.drift_report_file.clone(),
            data_quality_report_file: section.data_quality_report_file.clone(),
            drift_p_value_threshold: section.drift_p_value_threshold,
            enforce: section.enforce,
            schema: self.schema.clone(),
            train_file_path: ingestion.local_train_file.clone(),
            test_file_path: ingestion.local_test_file.clone(),
        })
    }

    pub fn feature_engineering_config(&self) -> Result<FeatureEngineeringConfig> {
        let config = self.config.feature_engineering.clone();
        create_directories(&[
            &config.root_dir,
            &config.engineered_features_dir,
            &config.feature_importance_dir,
            &config.correlation_analysis_dir,
            &config.feature_selection_dir,
        ])?;
        Ok(config)
    }

    pub fn feature_settings(&self) -> Result<FeatureSettings> {
        let settings = self.config.features.clone();
        if settings.numeric_features.is_empty() && settings.categorical_features.is_empty() {
            return Err(PipelineError::Config("no features declared".to_string()));
        }
        if let Some(selection) = &settings.feature_selection {
            if selection.k_best == 0 {
                return Err(PipelineError::Config("feature_selection.k_best must be > 0".to_string()));
            }
        }
        Ok(settings)
    }

    pub fn data_transformation_config(&self) -> Result<DataTransformationConfig> {
        let config = self.config.data_transformation.clone();
        create_directories(&[&config.root_dir])?;
        create_directories(&parent_dirs(&[&config.preprocessor_obj_file_path]))?;
        Ok(config)
    }

    pub fn model_trainer_config(&self) -> Result<ModelTrainerConfig> {
        let section = &self.config.model_trainer;
        create_directories(&[&section.root_dir])?;
        if !(0.0..=1.0).contains(&section.expected_accuracy) {
            return Err(PipelineError::Config(format!(
                "expected_accuracy must be within [0, 1], got {}",
                section.expected_accuracy
            )));
        }

        Ok(ModelTrainerConfig {
            root_dir: section.root_dir.clone(),
            train_data_path: section.train_data_path.clone(),
            test_data_path: section.test_data_path.clone(),
            model_name: section.model_name.clone(),
            target_column: section.target_column.clone(),
            expected_accuracy: section.expected_accuracy,
            model_params: self.params.clone(),
            tracking: self.tracking_config(),
        })
    }

    pub fn model_evaluation_config(&self) -> Result<ModelEvaluationConfig> {
        let section = &self.config.model_evaluation;
        create_directories(&[&section.root_dir])?;
        create_directories(&parent_dirs(&[&section.metric_file_name]))?;

        Ok(ModelEvaluationConfig {
            root_dir: section.root_dir.clone(),
            test_data_path: section.test_data_path.clone(),
            model_path: section.model_path.clone(),
            metric_file_name: section.metric_file_name.clone(),
            target_column: section.target_column.clone(),
            tracking: self.tracking_config(),
        })
    }

    /// Tracker settings; `MLFLOW_TRACKING_URI` overrides the configured URI
    pub fn tracking_config(&self) -> TrackingConfig {
        let uri = std::env::var("MLFLOW_TRACKING_URI")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.config.model_evaluation.mlflow_uri.clone());

        TrackingConfig {
            uri,
            experiment_name: self.config.experiment_name.clone(),
            local_dir: self.config.artifacts_root.join("tracking"),
        }
    }
}
