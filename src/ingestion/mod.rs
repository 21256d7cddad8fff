//! Data ingestion stage
//!
//! Fetches the raw competition files, subsamples them to fixed sizes and
//! writes the results where the validation stage expects them.

mod source;

pub use source::{DatasetSource, FetchedFiles, KaggleCredentials, KaggleSource, LocalSource, TEST_FILE, TRAIN_FILE};

use crate::artifacts::DataIngestionArtifact;
use crate::config::{DataIngestionConfig, SourceKind};
use crate::error::{PipelineError, Result};
use crate::utils::{self, data_loader, sampling};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{info, warn};

/// Build the configured source
pub fn source_from_config(config: &DataIngestionConfig) -> Result<Box<dyn DatasetSource>> {
    match config.source {
        SourceKind::Local => {
            let dir = config.source_dir.clone().ok_or_else(|| {
                PipelineError::Config("data_ingestion.source_dir is required for the local source".to_string())
            })?;
            Ok(Box::new(LocalSource::new(dir)))
        }
        SourceKind::Kaggle => {
            let credentials = KaggleCredentials::from_env()?;
            Ok(Box::new(KaggleSource::new(config.competition_name.clone(), credentials)?))
        }
    }
}

pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    /// Fetch, subsample and persist the train/test files
    pub fn initiate_data_ingestion(&self, source: &dyn DatasetSource) -> Result<DataIngestionArtifact> {
        info!(source = %source.describe(), "Starting data ingestion");
        let fetched = source.fetch(&self.config.raw_data_dir)?;

        let train = data_loader::load_non_empty_csv(&fetched.train)
            .map_err(|e| PipelineError::Ingestion(format!("train file unusable: {}", e)))?;
        let test = data_loader::load_non_empty_csv(&fetched.test)
            .map_err(|e| PipelineError::Ingestion(format!("test file unusable: {}", e)))?;
        info!(train_rows = train.height(), test_rows = test.height(), "Raw files loaded");

        let mut train = self.subsample(train, self.config.train_sample_size, "train")?;
        let mut test = self.subsample(test, self.config.test_sample_size, "test")?;

        utils::save_csv(&mut train, &self.config.local_train_file)?;
        utils::save_csv(&mut test, &self.config.local_test_file)?;

        let message = format!(
            "Data ingestion completed: {} train rows, {} test rows from {}",
            train.height(),
            test.height(),
            source.describe()
        );
        info!(
            train = %self.config.local_train_file.display(),
            test = %self.config.local_test_file.display(),
            "{}", message
        );

        Ok(DataIngestionArtifact {
            root_dir: self.config.root_dir.clone(),
            raw_data_dir: self.config.raw_data_dir.clone(),
            train_data_dir: self.config.train_data_dir.clone(),
            test_data_dir: self.config.test_data_dir.clone(),
            train_file_path: self.config.local_train_file.clone(),
            test_file_path: self.config.local_test_file.clone(),
            message,
        })
    }

    /// Keep at most `size` rows, stratified on the target when it is present
    fn subsample(&self, df: DataFrame, size: usize, split: &str) -> Result<DataFrame> {
        if df.height() <= size {
            return Ok(df);
        }
        let seed = self.config.random_seed;

        let target = self.config.target_column.as_str();
        let has_target = df.get_column_names().iter().any(|c| c.as_str() == target);

        let labels = if has_target {
            match data_loader::target_labels(&df, target) {
                Ok(labels) if sampling::can_stratify(&labels) => Some(labels),
                _ => {
                    warn!(split, target, "Target unusable for stratification, sampling uniformly");
                    None
                }
            }
        } else {
            None
        };

        let indices = match labels {
            Some(labels) => {
                info!(split, target, rows = size, "Stratified subsample");
                sampling::stratified_sample(&labels, size, seed)
            }
            None => {
                info!(split, rows = size, "Uniform subsample");
                sampling::uniform_sample(df.height(), size, seed)
            }
        };

        data_loader::take_rows(&df, &indices)
    }
}

/// Convenience for tests and the CLI: ingest from a local directory
pub fn ingest_from_dir(config: DataIngestionConfig, dir: &Path) -> Result<DataIngestionArtifact> {
    DataIngestion::new(config).initiate_data_ingestion(&LocalSource::new(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use polars::prelude::*;
    use tempfile::TempDir;

    fn write_raw(dir: &Path, n_train: usize, n_test: usize) {
        let ages: Vec<i64> = (0..n_train as i64).map(|i| 20 + i % 50).collect();
        let ys: Vec<i64> = (0..n_train as i64).map(|i| i64::from(i % 5 == 0)).collect();
        let mut train = df!("age" => &ages, "y" => &ys).unwrap();
        let test_ages: Vec<i64> = (0..n_test as i64).collect();
        let mut test = df!("age" => &test_ages).unwrap();
        utils::save_csv(&mut train, &dir.join(TRAIN_FILE)).unwrap();
        utils::save_csv(&mut test, &dir.join(TEST_FILE)).unwrap();
    }

    fn ingestion_config(root: &Path, raw: &Path, train: usize, test: usize) -> DataIngestionConfig {
        let mut config = PipelineConfig::with_root(root, Some(raw.to_path_buf())).data_ingestion;
        config.train_sample_size = train;
        config.test_sample_size = test;
        config
    }

    #[test]
    fn test_subsamples_to_target_sizes() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw_src");
        std::fs::create_dir_all(&raw).unwrap();
        write_raw(&raw, 500, 200);

        let config = ingestion_config(&tmp.path().join("artifacts"), &raw, 100, 50);
        let artifact = ingest_from_dir(config, &raw).unwrap();

        let train = utils::load_csv(&artifact.train_file_path).unwrap();
        let test = utils::load_csv(&artifact.test_file_path).unwrap();
        assert_eq!(train.height(), 100);
        assert_eq!(test.height(), 50);

        let positives = data_loader::target_labels(&train, "y").unwrap().iter().sum::<f64>();
        assert_eq!(positives, 20.0);
        assert!(artifact.message.contains("100 train rows"));
    }

    #[test]
    fn test_small_files_kept_whole() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw_src");
        std::fs::create_dir_all(&raw).unwrap();
        write_raw(&raw, 40, 10);

        let config = ingestion_config(&tmp.path().join("artifacts"), &raw, 100, 50);
        let artifact = ingest_from_dir(config, &raw).unwrap();
        assert_eq!(utils::load_csv(&artifact.train_file_path).unwrap().height(), 40);
    }

    #[test]
    fn test_empty_source_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw_src");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join(TRAIN_FILE), "").unwrap();
        std::fs::write(raw.join(TEST_FILE), "age\n1\n").unwrap();

        let config = ingestion_config(&tmp.path().join("artifacts"), &raw, 100, 50);
        let err = ingest_from_dir(config, &raw).unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(_)));
    }
}
