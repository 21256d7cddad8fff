//! API route definitions

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "code": "E_NOT_FOUND",
            "message": "Not found. Available endpoints: POST /predict, GET /health, GET /metrics, GET /status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "code": "E_METHOD",
            "message": "Method not allowed.",
        })),
    )
}

/// CORS from `CORS_ORIGIN`; unset or `*` allows any origin
fn cors_layer() -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => base.allow_origin(value),
            Err(_) => {
                warn!(origin = %origin, "Invalid CORS_ORIGIN; allowing any origin");
                base.allow_origin(Any)
            }
        },
        _ => base.allow_origin(Any),
    }
}

/// Create the prediction service router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/status", get(handlers::status))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}
