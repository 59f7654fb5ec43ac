use axum::extract::{Query, State};
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use codereel_core::types::Engine;
use codereel_pipeline::health::{health_report, HealthReport};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    /// `p5` or `manim`; both engines when absent.
    pub engine: Option<String>,
    /// Drop cached tool paths before checking.
    #[serde(default)]
    pub refresh: bool,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every reported engine is ready, otherwise `degraded`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    #[serde(flatten)]
    pub report: HealthReport,
}

/// GET /health, GET /api/health -- engine readiness.
async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> AppResult<Json<HealthResponse>> {
    let engine = query
        .engine
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .map(str::parse::<Engine>)
        .transpose()?;

    let tools = state.pipeline.tools();
    if query.refresh {
        tools.refresh().await;
    }

    let report = health_report(tools, state.pipeline.settings(), engine).await;

    Ok(Json(HealthResponse {
        status: if report.ready { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        report,
    }))
}

/// Mount health check routes, both at the root and under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
}
