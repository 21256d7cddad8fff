//! Integration test: prediction service endpoints

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bank_mlops::config::ModelParams;
use bank_mlops::server::{create_router, AppState, CustomerRecord, PreprocessingStrategy, ServerConfig};
use bank_mlops::training::{ClassifierModel, TrainedModel};
use bank_mlops::utils;
use ndarray::Array2;
use polars::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const COLUMNS: [&str; 6] = ["age", "duration", "housing_yes", "housing_no", "month_may", "poutcome_unknown"];

/// Model over the heuristic columns plus the transformed training header
/// it is discovered from; no fitted preprocessor is written
fn write_artifacts(root: &Path) -> ServerConfig {
    let config = ServerConfig::with_artifacts_root(root);
    let names: Vec<String> = COLUMNS.iter().map(|s| s.to_string()).collect();

    let n = 60;
    let x = Array2::from_shape_fn((n, COLUMNS.len()), |(i, j)| match j {
        0 => ((i % 30) as f64 - 15.0) / 10.0,
        1 => if i % 2 == 0 { 1.5 } else { -1.0 },
        2 => (i % 2 == 0) as u8 as f64,
        3 => (i % 2 == 1) as u8 as f64,
        _ => 1.0,
    });
    let y: Vec<f64> = (0..n).map(|i| (i % 2 == 0) as u8 as f64).collect();

    let mut model = ClassifierModel::candidates(&ModelParams::default()).remove(1);
    model.fit(&x, &y).unwrap();
    TrainedModel::new(model, names.clone()).save(&config.model_path).unwrap();

    let mut header = utils::frame_from_matrix(&names, &x).unwrap();
    header
        .with_column(Series::new("y".into(), y.iter().map(|&v| v as i64).collect::<Vec<_>>()))
        .unwrap();
    utils::save_csv(&mut header, &config.transformed_train_path).unwrap();
    config
}

fn app(config: ServerConfig) -> Router {
    create_router(Arc::new(AppState::load(config).unwrap()))
}

fn customer() -> Value {
    json!({
        "age": 35, "job": "technician", "marital": "married", "education": "secondary",
        "housing": "yes", "loan": "no", "duration": 450, "campaign": 2
    })
}

async fn post_predict(app: Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: Router, uri: &str) -> Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_predict_with_heuristic_fallback() {
    let tmp = TempDir::new().unwrap();
    let app = app(write_artifacts(tmp.path()));

    let (status, json) = post_predict(app.clone(), customer().to_string()).await;
    assert_eq!(status, StatusCode::OK);

    let p = json["probability"].as_f64().unwrap();
    let confidence = json["confidence"].as_f64().unwrap();
    assert!((confidence - p.max(1.0 - p)).abs() < 1e-12);
    let expected_level = if confidence > 0.8 {
        "High"
    } else if confidence > 0.6 {
        "Medium"
    } else {
        "Low"
    };
    assert_eq!(json["confidence_level"], expected_level);

    let expected_result = if json["prediction"] == 1 {
        "Will Subscribe to Term Deposit"
    } else {
        "Will Not Subscribe to Term Deposit"
    };
    assert_eq!(json["result"], expected_result);
    assert!(json["timestamp"].as_str().is_some());

    let status = get_json(app, "/status").await;
    assert_eq!(status["preprocessing_strategy"], "heuristic_fallback");
    assert_eq!(status["model_loaded"], true);
}

#[tokio::test]
async fn test_predictions_are_deterministic() {
    let tmp = TempDir::new().unwrap();
    let app = app(write_artifacts(tmp.path()));

    let (_, first) = post_predict(app.clone(), customer().to_string()).await;
    let (_, second) = post_predict(app, customer().to_string()).await;
    assert_eq!(first["prediction"], second["prediction"]);
    assert_eq!(first["probability"], second["probability"]);
}

#[tokio::test]
async fn test_missing_field_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let app = app(write_artifacts(tmp.path()));

    let mut body = customer();
    body.as_object_mut().unwrap().remove("age");
    let (status, json) = post_predict(app.clone(), body.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);
    assert_eq!(json["missing_fields"], json!(["age"]));
    assert!(json["message"].as_str().unwrap().contains("age"));

    let metrics = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(metrics.into_body(), 64 * 1024).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("prediction_requests_total 1"));
    assert!(text.contains("prediction_failures_total 1"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (status, json) = post_predict(app(write_artifacts(tmp.path())), "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);

    let mut body = customer();
    body["duration"] = json!("long");
    let (status, json) = post_predict(app(write_artifacts(tmp.path())), body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("duration"));
}

#[tokio::test]
async fn test_missing_model_answers_503() {
    let tmp = TempDir::new().unwrap();
    let app = app(ServerConfig::with_artifacts_root(tmp.path()));

    let health = get_json(app.clone(), "/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], false);

    let (status, json) = post_predict(app, customer().to_string()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "E_MODEL_NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_route() {
    let tmp = TempDir::new().unwrap();
    let response = app(ServerConfig::with_artifacts_root(tmp.path()))
        .oneshot(Request::builder().uri("/train").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_housing_sets_exactly_one_indicator() {
    let strategy = PreprocessingStrategy::HeuristicFallback {
        columns: COLUMNS.iter().map(|s| s.to_string()).collect(),
    };
    let record = CustomerRecord::from_json(&customer()).unwrap();
    let x = strategy.transform(&record).unwrap();

    assert_eq!(x[[0, 2]], 1.0);
    assert_eq!(x[[0, 3]], 0.0);
    // month and poutcome defaults hit their indicators too
    assert_eq!(x[[0, 4]], 1.0);
    assert_eq!(x[[0, 5]], 1.0);
}
