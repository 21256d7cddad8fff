//! Error types for the training pipeline and prediction service

use thiserror::Error;

/// Result type alias using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Short tag logged next to the error when a stage fails
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "E_CONFIG",
            PipelineError::Io(_) => "E_IO",
            PipelineError::Data(_) => "E_DATA",
            PipelineError::Schema(_) => "E_SCHEMA",
            PipelineError::Validation(_) => "E_VALIDATION",
            PipelineError::Ingestion(_) => "E_INGESTION",
            PipelineError::Training(_) => "E_TRAIN",
            PipelineError::ModelNotFound(_) => "E_MODEL_NOT_FOUND",
            PipelineError::ModelNotFitted => "E_NOT_FITTED",
            PipelineError::ShapeError { .. } => "E_SHAPE",
            PipelineError::Serialization(_) => "E_SERDE",
            PipelineError::Tracking(_) => "E_TRACKING",
            PipelineError::InvalidInput(_) => "E_INPUT",
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Ingestion(err.to_string())
    }
}

impl From<prometheus::Error> for PipelineError {
    fn from(err: prometheus::Error) -> Self {
        PipelineError::Config(format!("metrics registry: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PipelineError::Training("low".into()).code(), "E_TRAIN");
        assert_eq!(PipelineError::ModelNotFound("m".into()).code(), "E_MODEL_NOT_FOUND");
        let io: PipelineError = std::io::Error::new(std::io::ErrorKind::NotFound, "x").into();
        assert_eq!(io.code(), "E_IO");
    }

    #[test]
    fn test_display() {
        let err = PipelineError::ShapeError {
            expected: "3 columns".into(),
            actual: "2 columns".into(),
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected 3 columns, got 2 columns");
    }
}
