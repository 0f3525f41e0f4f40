//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{healthy_models, nominal_values, orchestrator, test_config, ScriptedNarrator, StaticIndex, StubModel};
use std::sync::Arc;
use tower::ServiceExt;
use turbofan_diag::api::{create_app, ApiState};
use turbofan_diag::models::ModelPredictor;

fn app_with(models: Vec<Arc<dyn ModelPredictor>>) -> Router {
    let orch = orchestrator(
        test_config(),
        models,
        StaticIndex::with_cases(&[("Healthy", 0.1)]),
        ScriptedNarrator::new(vec![Ok("Executive Summary\nNominal.".to_string())]),
    );
    create_app(ApiState::new(Arc::new(orch)))
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_analyze_returns_full_state() {
    let app = app_with(healthy_models());
    let resp = app
        .oneshot(post_json("/api/v1/analyze", &serde_json::json!({ "values": nominal_values() })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    let data = &v["data"];
    assert_eq!(data["risk"]["risk_level"], "LOW");
    assert_eq!(data["schedule"]["maintenance_window"], "ROUTINE");
    assert_eq!(data["report"]["generated"], true);
    assert_eq!(data["journal"].as_array().unwrap().len(), 5);
    assert!(v.get("meta").is_some());
}

#[tokio::test]
async fn test_analyze_rejects_wrong_length_with_400() {
    let app = app_with(healthy_models());
    let resp = app
        .oneshot(post_json("/api/v1/analyze", &serde_json::json!({ "values": [1.0, 2.0, 3.0] })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"], "BAD_REQUEST");
    assert!(v["error"]["message"].as_str().unwrap().contains("24"));
}

#[tokio::test]
async fn test_analyze_fatal_returns_422_with_partial_state() {
    let app = app_with(vec![StubModel::failing("fd001"), StubModel::failing("fd002")]);
    let resp = app
        .oneshot(post_json("/api/v1/analyze", &serde_json::json!({ "values": nominal_values() })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"], "PIPELINE_FATAL");
    let details = &v["error"]["details"];
    assert_eq!(details["stage"], "prediction");
    assert_eq!(details["cause"]["kind"], "all_models_failed");
    assert!(details["partial"]["ensemble"].is_null());
}

#[tokio::test]
async fn test_batch_runs_every_observation() {
    let app = app_with(healthy_models());
    let body = serde_json::json!({
        "observations": [nominal_values(), [1.0, 2.0], nominal_values()]
    });
    let resp = app.oneshot(post_json("/api/v1/analyze/batch", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["data"]["total"], 3);
    assert_eq!(v["data"]["completed"], 2);
    assert_eq!(v["data"]["failed"], 1);
    let items = v["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["status"], "completed");
    assert_eq!(items[1]["status"], "invalid");
    assert_eq!(items[1]["index"], 1);
    assert_eq!(items[2]["status"], "completed");
}

#[tokio::test]
async fn test_health_lists_collaborators() {
    let app = app_with(healthy_models());
    let resp = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["data"]["status"], "ok");
    assert_eq!(v["data"]["models"], serde_json::json!(["fd001", "fd002", "fd003"]));
    assert_eq!(v["data"]["similarity_index"], "static");
    assert_eq!(v["data"]["narrative_backend"], "scripted");
    assert_eq!(v["data"]["stats"]["runs_started"], 0);
}

#[tokio::test]
async fn test_config_endpoint_returns_effective_config() {
    let app = app_with(healthy_models());
    let resp = app
        .oneshot(Request::get("/api/v1/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["data"]["risk"]["high_cut"], 0.66);
    assert_eq!(v["data"]["timeouts"]["model_ms"], 100);
    assert_eq!(v["data"]["sensors"]["channels"].as_array().unwrap().len(), 24);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app_with(healthy_models());
    let resp = app
        .oneshot(Request::get("/api/v1/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
