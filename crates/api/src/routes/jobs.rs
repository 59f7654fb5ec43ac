use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};

use codereel_core::error::CoreError;
use codereel_core::job::JobSnapshot;
use codereel_core::types::RunId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/jobs/{run_id} -- status and outcome of one job.
async fn get_job(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let snapshot = state
        .store
        .snapshot(&RunId::from(run_id.as_str()))
        .await
        .ok_or(CoreError::JobNotFound(run_id))?;
    Ok(Json(DataResponse { data: snapshot }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/jobs/{run_id}", get(get_job))
}
