//! Monitoring Module
//!
//! Prometheus collectors for the pipeline and the prediction service, the
//! per-stage [`StageSpan`] guard, and a small scrape endpoint for runs that
//! want their pipeline metrics exposed on a separate port.

pub mod metrics;
pub mod stage;

pub use metrics::{encode, PipelineMetrics, ServingMetrics};
pub use stage::{StageOutcome, StageSpan};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::Registry;
use std::net::SocketAddr;
use tracing::{info, warn};

async fn scrape(State(registry): State<Registry>) -> impl IntoResponse {
    match encode(&registry) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Router serving `registry` at `GET /metrics`
pub fn metrics_router(registry: Registry) -> Router {
    Router::new().route("/metrics", get(scrape)).with_state(registry)
}

/// Serve `registry` until the task is dropped
pub async fn serve_metrics(addr: SocketAddr, registry: Registry) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Pipeline metrics exposed");
    if let Err(e) = axum::serve(listener, metrics_router(registry)).await {
        warn!(error = %e, "Metrics endpoint stopped");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_router() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.set_feature_count(30);

        let response = metrics_router(metrics.registry().clone())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("ml_feature_count 30"));
    }
}
