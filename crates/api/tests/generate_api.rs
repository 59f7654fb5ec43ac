//! Integration tests for job submission, log streaming and video serving.

mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, get, post_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: request validation happens before a job is created
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_rejects_unknown_engine() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, state) = common::build_test_app(tmp.path());

    let response = post_json(
        app,
        "/api/generate",
        json!({ "prompt": "a circle", "engine": "flash" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ENGINE");
    assert!(state.store.is_empty().await);
}

#[tokio::test]
async fn generate_rejects_empty_prompt() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, state) = common::build_test_app(tmp.path());

    let response = post_json(app, "/api/generate", json!({ "prompt": "  ", "engine": "p5" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(state.store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: a job is created, streams its log and ends with a done event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_log_stream_ends_with_done_event() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = post_json(
        app.clone(),
        "/api/generate",
        json!({ "prompt": "a bouncing ball", "engine": "p5", "duration": 2 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let run_id = body_json(response).await["runId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get(app.clone(), &format!("/api/logs?runId={run_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    // No API key is configured, so the job fails during code generation.
    let body = body_text(response).await;
    assert!(body.contains("data: Generating p5 code"));
    assert!(body.contains("data: Error: "));
    let done = body
        .split("\n\n")
        .find(|event| event.contains("event: done"))
        .expect("stream must end with a done event");
    assert!(done.contains(r#""success":false"#));
    assert!(done.contains("missing_api_key"));

    let response = get(app, &format!("/api/jobs/{run_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "done");
    assert_eq!(json["data"]["outcome"]["kind"], "missing_api_key");
}

#[tokio::test]
async fn logs_for_unknown_run_are_404() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/api/logs?runId=nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_job_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());

    let response = get(app, "/api/jobs/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: finished videos are served under /videos
// ---------------------------------------------------------------------------

#[tokio::test]
async fn videos_are_served_from_media_root() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = common::build_test_app(tmp.path());
    let dir = tmp.path().join("media/run1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("run1.mp4"), b"not really a video").unwrap();

    let response = get(app, "/videos/run1/run1.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "not really a video");
}
