//! Lyric document endpoints
//!
//! - GET  /lyrics?v=<video_id>              - authoritative document for a video
//! - GET  /lyrics?song=&artist=[&duration=]  - best match by song/artist
//! - GET  /lyrics/search?song=&artist=       - every match, best first
//! - GET  /lyrics/:id                        - document by id
//! - POST /lyrics/submit                     - submit or replace (protection gate applies)
//! - GET  /getLyrics?v= | ?s=&a=&d=          - legacy client lookup, content only

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use unison_common::db::{Confidence, Lyrics, LyricsFormat, SyncType};
use unison_common::time::unix_now;

use super::identity::resolve_voter;
use crate::db::lyrics::{self, LyricsSubmission, SongQuery, SubmitOutcome, SEARCH_LIMIT};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Public view of a lyric document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsResponse {
    pub id: i64,
    pub video_id: String,
    pub song: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: i64,
    pub lyrics: String,
    pub format: LyricsFormat,
    pub language: Option<String>,
    pub sync_type: SyncType,
    pub score: i64,
    pub effective_score: f64,
    pub vote_count: i64,
    pub confidence: Confidence,
}

impl From<Lyrics> for LyricsResponse {
    fn from(row: Lyrics) -> Self {
        Self {
            id: row.id,
            video_id: row.video_id,
            song: row.song,
            artist: row.artist,
            album: row.album,
            duration: row.duration,
            lyrics: row.lyrics,
            format: row.format,
            language: row.language,
            sync_type: row.sync_type,
            score: row.score,
            effective_score: row.effective_score,
            vote_count: row.vote_count,
            confidence: row.confidence,
        }
    }
}

/// Query parameters for the lookup endpoints
///
/// `s`, `a` and `d` are the short names legacy clients send.
#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub v: Option<String>,
    #[serde(alias = "s")]
    pub song: Option<String>,
    #[serde(alias = "a")]
    pub artist: Option<String>,
    #[serde(alias = "d")]
    pub duration: Option<i64>,
    pub album: Option<String>,
}

impl LookupQuery {
    fn video_id(&self) -> Option<&str> {
        self.v.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn song_query(&self) -> Option<SongQuery> {
        let song = self.song.as_deref().filter(|s| !s.trim().is_empty())?;
        let artist = self.artist.as_deref().filter(|a| !a.trim().is_empty())?;
        Some(SongQuery {
            duration: self.duration,
            album: self.album.clone(),
            ..SongQuery::new(song, artist)
        })
    }

    /// Video id wins when both forms are present
    async fn resolve(&self, state: &AppState) -> ApiResult<Lyrics> {
        if let Some(video_id) = self.video_id() {
            return lyrics::find_by_video_id(&state.db, video_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("lyrics for video {}", video_id)));
        }
        let query = self.song_query().ok_or_else(|| {
            ApiError::BadRequest("provide either 'v' or 'song' and 'artist'".to_string())
        })?;
        lyrics::find_by_song_artist(&state.db, &query, &state.config.matching)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("lyrics for {} by {}", query.song, query.artist))
            })
    }
}

/// Response for GET /getLyrics
#[derive(Debug, Serialize)]
pub struct LegacyLyricsResponse {
    pub lyrics: String,
    pub format: LyricsFormat,
}

/// Response for POST /lyrics/submit
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: i64,
    pub updated: bool,
    /// `created`, `updated` or `protected`
    pub status: &'static str,
}

/// GET /lyrics/:id
pub async fn get_lyrics_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<LyricsResponse>> {
    let row = lyrics::get_lyrics(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("lyrics {}", id)))?;
    Ok(Json(row.into()))
}

/// GET /lyrics?v=<video_id> or GET /lyrics?song=&artist=[&duration=][&album=]
pub async fn lookup_lyrics(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Json<LyricsResponse>> {
    let row = query.resolve(&state).await?;
    Ok(Json(row.into()))
}

/// GET /lyrics/search?song=&artist=[&duration=][&album=]
pub async fn search_lyrics(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Json<Vec<LyricsResponse>>> {
    let query = query
        .song_query()
        .ok_or_else(|| ApiError::BadRequest("provide 'song' and 'artist'".to_string()))?;
    let rows =
        lyrics::search_by_song_artist(&state.db, &query, &state.config.matching, SEARCH_LIMIT)
            .await?;
    Ok(Json(rows.into_iter().map(LyricsResponse::from).collect()))
}

/// GET /getLyrics
pub async fn legacy_get_lyrics(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Json<LegacyLyricsResponse>> {
    let row = query.resolve(&state).await?;
    Ok(Json(LegacyLyricsResponse {
        lyrics: row.lyrics,
        format: row.format,
    }))
}

/// POST /lyrics/submit
///
/// 201 for a new document, 200 for a replacement, 200 with
/// `updated: false` when the existing document is protected.
pub async fn submit_lyrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<LyricsSubmission>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let submitter = resolve_voter(&state, &headers).await?;
    let outcome = lyrics::submit_lyrics(
        &state.db,
        &submission,
        Some(submitter.id),
        &state.config.protection,
        unix_now(),
    )
    .await?;

    let (code, status) = match outcome {
        SubmitOutcome::Created { .. } => (StatusCode::CREATED, "created"),
        SubmitOutcome::Updated { .. } => (StatusCode::OK, "updated"),
        SubmitOutcome::Protected { .. } => (StatusCode::OK, "protected"),
    };

    Ok((
        code,
        Json(SubmitResponse {
            id: outcome.id(),
            updated: outcome.updated(),
            status,
        }),
    ))
}

/// Build lyric document routes
pub fn lyrics_routes() -> Router<AppState> {
    Router::new()
        .route("/lyrics", get(lookup_lyrics))
        .route("/lyrics/search", get(search_lyrics))
        .route("/lyrics/submit", post(submit_lyrics))
        .route("/getLyrics", get(legacy_get_lyrics))
        .route("/lyrics/:id", get(get_lyrics_by_id))
}
