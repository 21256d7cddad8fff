//! Error types for the prediction service

use crate::error::PipelineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::MissingFields(_) => "E_MISSING_FIELDS",
            ServerError::BadRequest(_) => "E_INPUT",
            ServerError::ModelNotFound(_) => "E_MODEL_NOT_FOUND",
            ServerError::Internal(_) => "E_INTERNAL",
            ServerError::Pipeline(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::MissingFields(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ServerError::ModelNotFound(_) | ServerError::Pipeline(PipelineError::ModelNotFound(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Internal(_) | ServerError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Internal(_) | ServerError::Pipeline(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(code = self.code(), detail = %self, "Prediction failed");
                "Prediction failed. Check server logs for details.".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": true,
            "code": self.code(),
            "message": message,
        });
        if let ServerError::MissingFields(fields) = &self {
            body["missing_fields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
