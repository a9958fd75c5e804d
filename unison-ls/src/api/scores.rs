//! On-demand score update
//!
//! POST /scores/update runs one scoring cycle immediately and returns its
//! report. 409 when a cycle is already in progress.

use axum::{extract::State, routing::post, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::services::ScoreUpdateReport;
use crate::AppState;

/// POST /scores/update
pub async fn run_score_update(State(state): State<AppState>) -> ApiResult<Json<ScoreUpdateReport>> {
    match state.updater.run_cycle().await? {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::Conflict("score update already running".to_string())),
    }
}

/// Build score update routes
pub fn score_routes() -> Router<AppState> {
    Router::new().route("/scores/update", post(run_score_update))
}
