//! Prediction service
//!
//! Serves the persisted model over HTTP. Artifacts are loaded once at
//! startup; requests never touch the filesystem.

mod api;
mod error;
mod features;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use features::{CustomerRecord, PreprocessingStrategy, REQUIRED_FIELDS};
pub use handlers::{confidence_level, result_label, PredictionResponse};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    /// Transformed training data; its header drives the heuristic fallback
    pub transformed_train_path: PathBuf,
    /// Fitted feature pipeline from the feature engineering stage
    pub preprocessor_path: PathBuf,
    /// Scaler fitted by the transformation stage
    pub scaler_path: PathBuf,
    pub target_column: String,
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl ServerConfig {
    /// Artifact locations under `root`, matching the pipeline layout
    pub fn with_artifacts_root(root: &Path) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: root.join("model_trainer").join("model.bin"),
            transformed_train_path: root.join("data_transformation").join("train.csv"),
            preprocessor_path: root.join("feature_engineering").join("preprocessor.bin"),
            scaler_path: root.join("data_transformation").join("preprocessor.bin"),
            target_column: "y".to_string(),
        }
    }

    /// Defaults overridden by `API_HOST`, `API_PORT`, `MODEL_PATH`,
    /// `TRANSFORMED_TRAIN_PATH`, `PREPROCESSOR_PATH` and `SCALER_PATH`
    pub fn from_env() -> Self {
        let defaults = Self::with_artifacts_root(Path::new("artifacts"));
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            model_path: env_path("MODEL_PATH", defaults.model_path),
            transformed_train_path: env_path("TRANSFORMED_TRAIN_PATH", defaults.transformed_train_path),
            preprocessor_path: env_path("PREPROCESSOR_PATH", defaults.preprocessor_path),
            scaler_path: env_path("SCALER_PATH", defaults.scaler_path),
            target_column: defaults.target_column,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = Arc::new(AppState::load(config)?);
    info!(
        model_loaded = state.model_loaded(),
        preprocessing = state.strategy.name(),
        "Prediction service initialised"
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install ctrl+c handler");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_layout() {
        let config = ServerConfig::with_artifacts_root(Path::new("artifacts"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_path, Path::new("artifacts/model_trainer/model.bin"));
        assert_eq!(config.scaler_path, Path::new("artifacts/data_transformation/preprocessor.bin"));
        assert_eq!(config.target_column, "y");
    }
}
