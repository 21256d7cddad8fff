//! Training pipeline orchestration
//!
//! Stages run strictly in order on the calling thread. The first failing
//! stage aborts the run; every stage overwrites its own outputs, so a rerun
//! starts cleanly from the beginning.

use crate::artifacts::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact, FeatureEngineeringArtifact,
    ModelEvaluationArtifact, ModelTrainerArtifact,
};
use crate::config::ConfigurationManager;
use crate::error::Result;
use crate::evaluation::ModelEvaluation;
use crate::feature_engineering::FeatureEngineering;
use crate::ingestion::{source_from_config, DataIngestion, DatasetSource};
use crate::monitoring::{PipelineMetrics, StageSpan};
use crate::tracking::{tracker_from_config, ExperimentTracker};
use crate::training::ModelTrainer;
use crate::transformation::DataTransformation;
use crate::validation::DataValidation;
use clap::ValueEnum;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Stage {
    Ingestion,
    Validation,
    Features,
    Transformation,
    Training,
    Evaluation,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Ingestion,
        Stage::Validation,
        Stage::Features,
        Stage::Transformation,
        Stage::Training,
        Stage::Evaluation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Ingestion => "data_ingestion",
            Stage::Validation => "data_validation",
            Stage::Features => "feature_engineering",
            Stage::Transformation => "data_transformation",
            Stage::Training => "model_trainer",
            Stage::Evaluation => "model_evaluation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of a single stage
#[derive(Debug, Clone)]
pub enum StageArtifact {
    Ingestion(DataIngestionArtifact),
    Validation(DataValidationArtifact),
    Features(FeatureEngineeringArtifact),
    Transformation(DataTransformationArtifact),
    Training(ModelTrainerArtifact),
    Evaluation(ModelEvaluationArtifact),
}

/// Outputs of a complete run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub features: FeatureEngineeringArtifact,
    pub transformation: DataTransformationArtifact,
    pub training: ModelTrainerArtifact,
    pub evaluation: ModelEvaluationArtifact,
}

pub struct TrainingPipeline {
    config: ConfigurationManager,
    metrics: PipelineMetrics,
    source: Option<Box<dyn DatasetSource>>,
    tracker: Option<Box<dyn ExperimentTracker>>,
}

impl TrainingPipeline {
    pub fn new(config: ConfigurationManager) -> Result<Self> {
        Ok(Self {
            config,
            metrics: PipelineMetrics::new()?,
            source: None,
            tracker: None,
        })
    }

    /// Use `source` instead of the one named in config.yaml
    pub fn with_source(mut self, source: Box<dyn DatasetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `tracker` instead of resolving one from the tracking URI
    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Report into an existing collector, e.g. one already being scraped
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    fn tracker(&mut self) -> &mut dyn ExperimentTracker {
        let config = &self.config;
        self.tracker
            .get_or_insert_with(|| tracker_from_config(&config.tracking_config()))
            .as_mut()
    }

    /// Run `f` inside a [`StageSpan`] for `stage`
    fn timed<T>(&mut self, stage: Stage, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let metrics = self.metrics.clone();
        let span = StageSpan::enter(stage.name(), Some(&metrics));
        let result = f(self);
        span.finish(&result);
        result
    }

    pub fn run_stage(&mut self, stage: Stage) -> Result<StageArtifact> {
        match stage {
            Stage::Ingestion => self.timed(stage, Self::ingest).map(StageArtifact::Ingestion),
            Stage::Validation => self.timed(stage, Self::validate).map(StageArtifact::Validation),
            Stage::Features => self.timed(stage, Self::engineer_features).map(StageArtifact::Features),
            Stage::Transformation => self.timed(stage, Self::transform).map(StageArtifact::Transformation),
            Stage::Training => self.timed(stage, Self::train).map(StageArtifact::Training),
            Stage::Evaluation => self.timed(stage, Self::evaluate).map(StageArtifact::Evaluation),
        }
    }

    /// All six stages in order, stopping at the first failure
    pub fn run_all(&mut self) -> Result<PipelineReport> {
        info!("Starting training pipeline");
        let ingestion = self.timed(Stage::Ingestion, Self::ingest)?;
        let validation = self.timed(Stage::Validation, Self::validate)?;
        let features = self.timed(Stage::Features, Self::engineer_features)?;
        let transformation = self.timed(Stage::Transformation, Self::transform)?;
        let training = self.timed(Stage::Training, Self::train)?;
        let evaluation = self.timed(Stage::Evaluation, Self::evaluate)?;
        info!(
            model = %training.best_model_name,
            accuracy = evaluation.train_model_metric_artifact.accuracy,
            accepted = evaluation.is_model_accepted,
            "Training pipeline completed"
        );

        Ok(PipelineReport {
            ingestion,
            validation,
            features,
            transformation,
            training,
            evaluation,
        })
    }

    fn ingest(&mut self) -> Result<DataIngestionArtifact> {
        let config = self.config.data_ingestion_config()?;
        match &self.source {
            Some(source) => DataIngestion::new(config).initiate_data_ingestion(source.as_ref()),
            None => {
                let source = source_from_config(&config)?;
                DataIngestion::new(config).initiate_data_ingestion(source.as_ref())
            }
        }
    }

    fn validate(&mut self) -> Result<DataValidationArtifact> {
        DataValidation::new(self.config.data_validation_config()?).validate_all_columns()
    }

    fn engineer_features(&mut self) -> Result<FeatureEngineeringArtifact> {
        FeatureEngineering::new(self.config.feature_engineering_config()?, self.config.feature_settings()?)
            .engineer_features()
    }

    fn transform(&mut self) -> Result<DataTransformationArtifact> {
        let artifact =
            DataTransformation::new(self.config.data_transformation_config()?).initiate_data_transformation()?;
        self.metrics.set_split_rows("train", artifact.train_rows);
        self.metrics.set_split_rows("test", artifact.test_rows);
        self.metrics.set_feature_count(artifact.feature_columns.len());
        Ok(artifact)
    }

    fn train(&mut self) -> Result<ModelTrainerArtifact> {
        let trainer = ModelTrainer::new(self.config.model_trainer_config()?);
        trainer.initiate_model_trainer(self.tracker())
    }

    fn evaluate(&mut self) -> Result<ModelEvaluationArtifact> {
        let evaluation = ModelEvaluation::new(self.config.model_evaluation_config()?);
        let artifact = evaluation.initiate_model_evaluation(self.tracker())?;
        self.metrics.set_model_scores(&artifact.train_model_metric_artifact);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelParams, PipelineConfig, Schema};
    use crate::error::PipelineError;
    use tempfile::TempDir;

    #[test]
    fn test_stage_names_and_order() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "data_ingestion",
                "data_validation",
                "feature_engineering",
                "data_transformation",
                "model_trainer",
                "model_evaluation"
            ]
        );
    }

    #[test]
    fn test_failed_stage_is_counted_and_stops_run() {
        let tmp = TempDir::new().unwrap();
        let config = PipelineConfig::with_root(&tmp.path().join("artifacts"), Some(tmp.path().join("missing")));
        let manager = ConfigurationManager::from_parts(config, ModelParams::default(), Schema::default()).unwrap();
        let mut pipeline = TrainingPipeline::new(manager).unwrap();

        let err = pipeline.run_all().unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(_)));
        assert_eq!(pipeline.metrics().stage_count("data_ingestion", false), 1);
        assert_eq!(pipeline.metrics().stage_count("data_validation", false), 0);
        assert_eq!(pipeline.metrics().stage_count("data_validation", true), 0);
    }
}
