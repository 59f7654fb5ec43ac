#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use codereel_api::config::ServerConfig;
use codereel_api::router::build_app_router;
use codereel_api::state::AppState;
use codereel_codegen::{ChatCompletionsApi, CodeGenerator, CodegenSettings};
use codereel_core::job::{JobStore, JobStoreConfig};
use codereel_detect::{DetectorEnv, ToolContext};
use codereel_pipeline::Pipeline;
use codereel_render::RenderSettings;

/// Test `ServerConfig` with a fast log poll.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        log_poll_interval: Duration::from_millis(10),
        job_sweep_interval: Duration::from_secs(60),
    }
}

/// State rooted at `root`, with no detectable tools and no default API
/// key, so jobs fail fast without network or processes.
pub fn test_state(root: &Path) -> AppState {
    let settings = RenderSettings {
        media_root: root.join("media"),
        scripts_dir: root.join("scripts"),
        ..RenderSettings::default()
    };
    let codegen = CodegenSettings {
        api_url: "http://127.0.0.1:9".to_string(),
        ..CodegenSettings::default()
    };
    let pipeline = Pipeline::new(
        CodeGenerator::new(ChatCompletionsApi::new(codegen), None),
        settings,
        Arc::new(ToolContext::new(DetectorEnv::empty())),
    );

    AppState {
        config: Arc::new(test_config()),
        store: Arc::new(JobStore::new(JobStoreConfig::default())),
        pipeline: Arc::new(pipeline),
    }
}

/// The production router over [`test_state`].
pub fn build_test_app(root: &Path) -> (Router, AppState) {
    let state = test_state(root);
    let app = build_app_router(state.clone(), &test_config());
    (app, state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
