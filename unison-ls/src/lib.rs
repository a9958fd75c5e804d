//! unison-ls library - lyrics scoring service
//!
//! Crowdsourced lyric documents are ranked by a reputation-weighted
//! consensus score. Votes and reports are accepted over HTTP; a periodic
//! score updater recomputes effective scores and feeds consensus back into
//! voter reputation.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use unison_common::ScoringConfig;

pub mod api;
pub mod db;
pub mod error;
pub mod scoring;
pub mod services;

use services::ScoreUpdater;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Scoring parameters, fixed for the life of the process
    pub config: Arc<ScoringConfig>,
    /// Score updater, shared with the background scheduler
    pub updater: Arc<ScoreUpdater>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: Arc<ScoringConfig>, updater: Arc<ScoreUpdater>) -> Self {
        Self { db, config, updater }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::lyrics_routes())
        .merge(api::vote_routes())
        .merge(api::score_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
