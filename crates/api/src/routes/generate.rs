use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use codereel_core::types::RunId;
use codereel_pipeline::run::spawn_job;
use codereel_pipeline::GenerateParams;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    pub engine: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sketch length in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub run_id: RunId,
}

/// POST /api/generate -- start a job and return its id immediately.
async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let params = GenerateParams::new(body.prompt, &body.engine, body.api_key, body.duration)?;
    let run_id = spawn_job(
        Arc::clone(&state.pipeline),
        Arc::clone(&state.store),
        params,
    )
    .await?;

    Ok(Json(GenerateResponse { run_id }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/generate", post(generate))
}
