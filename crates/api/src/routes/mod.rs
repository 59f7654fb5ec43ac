pub mod generate;
pub mod health;
pub mod jobs;
pub mod logs;

use axum::Router;

use crate::state::AppState;

/// Routes under `/api` that complete within the request timeout.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generate::router())
        .merge(jobs::router())
}
