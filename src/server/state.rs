//! Application state shared across handlers

use super::features::PreprocessingStrategy;
use super::ServerConfig;
use crate::error::PipelineError;
use crate::monitoring::ServingMetrics;
use crate::training::TrainedModel;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Loaded once at startup and read-only afterwards
pub struct AppState {
    pub config: ServerConfig,
    pub model: Option<TrainedModel>,
    pub strategy: PreprocessingStrategy,
    pub metrics: ServingMetrics,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load the model and pick a preprocessing strategy. A missing model
    /// keeps the service up; `/predict` then answers 503.
    pub fn load(config: ServerConfig) -> crate::error::Result<Self> {
        let metrics = ServingMetrics::new()?;

        let model = match TrainedModel::load(&config.model_path) {
            Ok(model) => {
                info!(
                    path = %config.model_path.display(),
                    model = %model.name,
                    features = model.feature_names.len(),
                    trained_at = %model.trained_at.to_rfc3339(),
                    "Model loaded"
                );
                Some(model)
            }
            Err(PipelineError::ModelNotFound(path)) => {
                warn!(path = %path, "Model artifact not found; predictions disabled");
                None
            }
            Err(e) => {
                warn!(path = %config.model_path.display(), error = %e, "Model artifact unreadable; predictions disabled");
                None
            }
        };
        metrics.set_model_loaded(model.is_some());

        let strategy = PreprocessingStrategy::resolve(
            &config.preprocessor_path,
            &config.scaler_path,
            &config.transformed_train_path,
            &config.target_column,
            model.as_ref().map(|m| m.feature_names.as_slice()),
        );

        Ok(Self {
            config,
            model,
            strategy,
            metrics,
            started_at: Utc::now(),
        })
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn uptime_seconds(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
