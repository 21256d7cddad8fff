//! API request handlers

use super::error::{Result, ServerError};
use super::features::CustomerRecord;
use super::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const SERVICE_NAME: &str = "bank-marketing-prediction";

/// Used when the model cannot produce a probability
const FALLBACK_PROBABILITY: f64 = 0.3;
const FALLBACK_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionResponse {
    pub prediction: u8,
    pub probability: f64,
    pub confidence: f64,
    pub confidence_level: &'static str,
    pub result: &'static str,
    pub timestamp: String,
}

pub fn confidence_level(confidence: f64) -> &'static str {
    if confidence > 0.8 {
        "High"
    } else if confidence > 0.6 {
        "Medium"
    } else {
        "Low"
    }
}

pub fn result_label(prediction: u8) -> &'static str {
    if prediction == 1 {
        "Will Subscribe to Term Deposit"
    } else {
        "Will Not Subscribe to Term Deposit"
    }
}

// ============================================================================
// Inference
// ============================================================================

pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let start = Instant::now();
    state.metrics.record_request();

    let result = run_prediction(&state, body);
    state.metrics.observe_latency(start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        state.metrics.record_failure();
        warn!(code = e.code(), error = %e, "Prediction request rejected");
    }
    result.map(Json)
}

fn run_prediction(
    state: &AppState,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<PredictionResponse> {
    let Json(body) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let model = state
        .model
        .as_ref()
        .ok_or_else(|| ServerError::ModelNotFound(state.config.model_path.display().to_string()))?;

    let record = CustomerRecord::from_json(&body)?;
    let x = state.strategy.transform(&record)?;

    let label = model.predict(&x)?.get(0).copied().unwrap_or(0.0);
    let prediction = u8::from(label >= 0.5);

    let (probability, confidence) = match model.predict_proba(&x) {
        Ok(p) => match p.get(0).copied().filter(|v| v.is_finite()) {
            Some(p) => (p, p.max(1.0 - p)),
            None => (FALLBACK_PROBABILITY, FALLBACK_CONFIDENCE),
        },
        Err(e) => {
            warn!(error = %e, "Probability output unavailable; using defaults");
            (FALLBACK_PROBABILITY, FALLBACK_CONFIDENCE)
        }
    };

    debug!(
        prediction,
        probability,
        strategy = state.strategy.name(),
        "Prediction served"
    );

    Ok(PredictionResponse {
        prediction,
        probability,
        confidence,
        confidence_level: confidence_level(confidence),
        result: result_label(prediction),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ============================================================================
// Service endpoints
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model_loaded": state.model_loaded(),
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => ServerError::from(e).into_response(),
    }
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "model_path": state.config.model_path.display().to_string(),
        "model_loaded": state.model_loaded(),
        "preprocessing_strategy": state.strategy.name(),
        "uptime_seconds": state.uptime_seconds(),
        "total_requests": state.metrics.total_requests(),
        "failed_requests": state.metrics.failed_requests(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_level(0.95), "High");
        assert_eq!(confidence_level(0.8), "Medium");
        assert_eq!(confidence_level(0.61), "Medium");
        assert_eq!(confidence_level(0.6), "Low");
        assert_eq!(confidence_level(0.5), "Low");
    }

    #[test]
    fn test_result_labels() {
        assert_eq!(result_label(1), "Will Subscribe to Term Deposit");
        assert_eq!(result_label(0), "Will Not Subscribe to Term Deposit");
    }
}
