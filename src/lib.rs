//! Bank marketing term-deposit training pipeline and prediction service
//!
//! Six stages run in a fixed order, each reading the artifacts of the
//! previous one from disk:
//!
//! - [`ingestion`] - fetch the raw train/test splits from Kaggle or a local directory
//! - [`validation`] - schema checks, data quality report and KS drift report
//! - [`feature_engineering`] - fitted feature pipeline, correlation and mutual-information selection
//! - [`transformation`] - fixed-size split and standard scaling
//! - [`training`] - three candidate model families, best-of selection and accuracy gate
//! - [`evaluation`] - holdout metrics and champion/challenger comparison
//!
//! [`pipeline`] wires the stages together, [`tracking`] records runs locally
//! or in MLflow, and [`server`] serves the persisted model over HTTP.

pub mod artifacts;
pub mod config;
pub mod error;

// Pipeline stages
pub mod evaluation;
pub mod feature_engineering;
pub mod ingestion;
pub mod training;
pub mod transformation;
pub mod validation;

// Shared building blocks
pub mod preprocessing;
pub mod utils;
pub mod visualization;

// Infrastructure
pub mod monitoring;
pub mod pipeline;
pub mod tracking;

// Services
pub mod cli;
pub mod server;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigurationManager, ModelParams, PipelineConfig, Schema};
    pub use crate::error::{PipelineError, Result};
    pub use crate::ingestion::{DatasetSource, KaggleSource, LocalSource};
    pub use crate::monitoring::{PipelineMetrics, ServingMetrics};
    pub use crate::pipeline::{PipelineReport, Stage, StageArtifact, TrainingPipeline};
    pub use crate::tracking::{ExperimentTracker, LocalTracker, MlflowTracker};
    pub use crate::training::{ClassifierModel, ModelMetrics, TrainedModel};
}
