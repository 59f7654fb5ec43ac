//! Integration tests for the health endpoints and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};

// ---------------------------------------------------------------------------
// Test: GET /health reports both engines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_both_engines_without_filter() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert!(json["version"].is_string());
    assert_eq!(json["ready"], false);
    assert_eq!(json["engines"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: GET /api/health?engine=manim reports one engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_health_filters_by_engine() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/api/health?engine=manim&refresh=true").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let engines = json["engines"].as_array().unwrap();
    assert_eq!(engines.len(), 1);
    assert_eq!(engines[0]["engine"], "manim");
    assert_eq!(engines[0]["requirements"]["manim"]["available"], false);
    assert!(engines[0]["requirements"]["manim"]["solution"].is_string());
    assert_eq!(engines[0]["requirements"]["latex"]["critical"], false);
}

// ---------------------------------------------------------------------------
// Test: unknown engine is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_engine_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/health?engine=flash").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_ENGINE");
}

// ---------------------------------------------------------------------------
// Test: unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/health").await;
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
