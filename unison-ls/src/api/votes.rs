//! Vote and report endpoints
//!
//! - POST   /lyrics/:id/vote   - cast or change a vote (`{"vote": 1 | -1}`)
//! - DELETE /lyrics/:id/vote   - retract a vote
//! - POST   /lyrics/:id/report - report a document
//!
//! Raw counters change immediately; the effective score follows on the
//! next scoring cycle.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use unison_common::db::{ReportReason, VoteDirection};
use unison_common::time::unix_now;

use super::identity::resolve_voter;
use super::MessageResponse;
use crate::db::reports::{self, ReportOutcome};
use crate::db::votes::{self, RetractOutcome, VoteOutcome};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of POST /lyrics/:id/vote
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: i64,
}

/// Body of POST /lyrics/:id/report
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reason: ReportReason,
    #[serde(default)]
    pub details: Option<String>,
}

/// POST /lyrics/:id/vote
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let direction = VoteDirection::try_from(request.vote)?;
    let voter = resolve_voter(&state, &headers).await?;

    let outcome = votes::cast_vote(&state.db, id, voter.id, direction, unix_now()).await?;
    let status = match outcome {
        VoteOutcome::AlreadyVoted => StatusCode::CONFLICT,
        VoteOutcome::Recorded | VoteOutcome::Changed => StatusCode::OK,
    };

    Ok((status, Json(MessageResponse::new(outcome.applied(), outcome.message()))))
}

/// DELETE /lyrics/:id/vote
pub async fn remove_vote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let voter = resolve_voter(&state, &headers).await?;

    let outcome = votes::remove_vote(&state.db, id, voter.id, unix_now()).await?;
    match outcome {
        RetractOutcome::Removed => Ok((
            StatusCode::OK,
            Json(MessageResponse::new(true, outcome.message())),
        )),
        RetractOutcome::NoVote => Err(ApiError::NotFound(outcome.message().to_string())),
    }
}

/// POST /lyrics/:id/report
pub async fn report_lyrics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ReportRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let reporter = resolve_voter(&state, &headers).await?;

    let outcome = reports::submit_report(
        &state.db,
        id,
        reporter.id,
        request.reason,
        request.details.as_deref(),
        &state.config.moderation,
        unix_now(),
    )
    .await?;

    let status = match outcome {
        ReportOutcome::Submitted { .. } => StatusCode::CREATED,
        ReportOutcome::AlreadyReported => StatusCode::CONFLICT,
    };
    let success = matches!(outcome, ReportOutcome::Submitted { .. });

    Ok((status, Json(MessageResponse::new(success, outcome.message()))))
}

/// Build vote and report routes
pub fn vote_routes() -> Router<AppState> {
    Router::new()
        .route("/lyrics/:id/vote", post(cast_vote).delete(remove_vote))
        .route("/lyrics/:id/report", post(report_lyrics))
}
