//! Lyric document registry
//!
//! Submissions are keyed by the external video id: one authoritative
//! document per video. Content replacement is refused once the raw score
//! reaches the protection threshold.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use unison_common::config::ProtectionConfig;
use unison_common::config::MatchingConfig;
use unison_common::db::{Lyrics, LyricsFormat, SyncType};
use unison_common::normalize::normalize_name;
use unison_common::{Error, Result};

use crate::scoring::ScoreUpdate;

/// Maximum song / artist / album length (characters)
pub const MAX_NAME_LEN: usize = 500;
/// Maximum lyric document size (bytes)
pub const MAX_LYRICS_BYTES: usize = 5 * 1024 * 1024;
/// Accepted track duration range (seconds)
pub const DURATION_RANGE: std::ops::RangeInclusive<i64> = 1..=3600;
/// Maximum rows returned by a song/artist search
pub const SEARCH_LIMIT: i64 = 20;

const LYRICS_COLUMNS: &str = r#"
    id, video_id, song, artist, album, duration, lyrics, format, language, sync_type,
    score, upvotes, downvotes, effective_score, vote_count, diversity_bonus, confidence,
    score_updated_at, vote_retracted_at, penalty_applied, submitter_id, created_at, updated_at
"#;

/// A candidate lyric document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsSubmission {
    pub video_id: String,
    pub song: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    pub duration: i64,
    pub lyrics: String,
    pub format: LyricsFormat,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sync_type: SyncType,
}

impl LyricsSubmission {
    /// Check field presence and size limits
    pub fn validate(&self) -> Result<()> {
        if self.video_id.trim().is_empty() {
            return Err(Error::InvalidInput("videoId is required".to_string()));
        }
        for (field, value) in [("song", &self.song), ("artist", &self.artist)] {
            let value = value.trim();
            if value.is_empty() {
                return Err(Error::InvalidInput(format!("{} is required", field)));
            }
            if value.chars().count() > MAX_NAME_LEN {
                return Err(Error::InvalidInput(format!(
                    "{} exceeds {} characters",
                    field, MAX_NAME_LEN
                )));
            }
        }
        if let Some(album) = &self.album {
            if album.trim().chars().count() > MAX_NAME_LEN {
                return Err(Error::InvalidInput(format!(
                    "album exceeds {} characters",
                    MAX_NAME_LEN
                )));
            }
        }
        if !DURATION_RANGE.contains(&self.duration) {
            return Err(Error::InvalidInput(format!(
                "duration must be within {}..={} seconds",
                DURATION_RANGE.start(),
                DURATION_RANGE.end()
            )));
        }
        if self.lyrics.trim().is_empty() {
            return Err(Error::InvalidInput("lyrics are required".to_string()));
        }
        if self.lyrics.len() > MAX_LYRICS_BYTES {
            return Err(Error::InvalidInput(format!(
                "lyrics exceed {} bytes",
                MAX_LYRICS_BYTES
            )));
        }
        Ok(())
    }

    fn album_trimmed(&self) -> Option<&str> {
        self.album.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// New document for a previously unseen video id
    Created { id: i64 },
    /// Existing unprotected document replaced
    Updated { id: i64 },
    /// Existing document is protected; content preserved
    Protected { id: i64 },
}

impl SubmitOutcome {
    pub fn id(&self) -> i64 {
        match self {
            SubmitOutcome::Created { id }
            | SubmitOutcome::Updated { id }
            | SubmitOutcome::Protected { id } => *id,
        }
    }

    /// Whether an existing document's content was replaced
    pub fn updated(&self) -> bool {
        matches!(self, SubmitOutcome::Updated { .. })
    }
}

fn lyrics_from_row(row: &SqliteRow) -> Result<Lyrics> {
    Ok(Lyrics {
        id: row.get("id"),
        video_id: row.get("video_id"),
        song: row.get("song"),
        artist: row.get("artist"),
        album: row.get("album"),
        duration: row.get("duration"),
        lyrics: row.get("lyrics"),
        format: row.get::<String, _>("format").parse()?,
        language: row.get("language"),
        sync_type: row.get::<String, _>("sync_type").parse()?,
        score: row.get("score"),
        upvotes: row.get("upvotes"),
        downvotes: row.get("downvotes"),
        effective_score: row.get("effective_score"),
        vote_count: row.get("vote_count"),
        diversity_bonus: row.get("diversity_bonus"),
        confidence: row.get::<String, _>("confidence").parse()?,
        score_updated_at: row.get("score_updated_at"),
        vote_retracted_at: row.get("vote_retracted_at"),
        penalty_applied: row.get("penalty_applied"),
        submitter_id: row.get("submitter_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Insert a new document or replace the content of an unprotected one
///
/// Each step is a single statement, so the protection check and the
/// replacement cannot be separated by a concurrent vote.
pub async fn submit_lyrics(
    pool: &SqlitePool,
    submission: &LyricsSubmission,
    submitter_id: Option<i64>,
    protection: &ProtectionConfig,
    now: i64,
) -> Result<SubmitOutcome> {
    submission.validate()?;
    let video_id = submission.video_id.trim();

    let created: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO lyrics (
            video_id, song, artist, song_norm, artist_norm, album, duration, lyrics, format,
            language, sync_type, submitter_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(video_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(video_id)
    .bind(submission.song.trim())
    .bind(submission.artist.trim())
    .bind(normalize_name(&submission.song))
    .bind(normalize_name(&submission.artist))
    .bind(submission.album_trimmed())
    .bind(submission.duration)
    .bind(&submission.lyrics)
    .bind(submission.format.as_str())
    .bind(submission.language.as_deref())
    .bind(submission.sync_type.as_str())
    .bind(submitter_id)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = created {
        return Ok(SubmitOutcome::Created { id });
    }

    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE lyrics SET
            song = ?,
            artist = ?,
            song_norm = ?,
            artist_norm = ?,
            album = ?,
            duration = ?,
            lyrics = ?,
            format = ?,
            language = ?,
            sync_type = ?,
            submitter_id = ?,
            updated_at = ?
        WHERE video_id = ? AND score < ?
        RETURNING id
        "#,
    )
    .bind(submission.song.trim())
    .bind(submission.artist.trim())
    .bind(normalize_name(&submission.song))
    .bind(normalize_name(&submission.artist))
    .bind(submission.album_trimmed())
    .bind(submission.duration)
    .bind(&submission.lyrics)
    .bind(submission.format.as_str())
    .bind(submission.language.as_deref())
    .bind(submission.sync_type.as_str())
    .bind(submitter_id)
    .bind(now)
    .bind(video_id)
    .bind(protection.min_score_to_protect)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = updated {
        return Ok(SubmitOutcome::Updated { id });
    }

    let id: i64 = sqlx::query_scalar("SELECT id FROM lyrics WHERE video_id = ?")
        .bind(video_id)
        .fetch_one(pool)
        .await?;

    Ok(SubmitOutcome::Protected { id })
}

/// Load a document by id
pub async fn get_lyrics(pool: &SqlitePool, lyrics_id: i64) -> Result<Option<Lyrics>> {
    let sql = format!("SELECT {} FROM lyrics WHERE id = ?", LYRICS_COLUMNS);
    let row = sqlx::query(&sql).bind(lyrics_id).fetch_optional(pool).await?;
    row.as_ref().map(lyrics_from_row).transpose()
}

/// Load the authoritative document for a video id
pub async fn find_by_video_id(pool: &SqlitePool, video_id: &str) -> Result<Option<Lyrics>> {
    let sql = format!("SELECT {} FROM lyrics WHERE video_id = ?", LYRICS_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(video_id.trim())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(lyrics_from_row).transpose()
}

/// Song/artist lookup, optionally narrowed by duration and album
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SongQuery {
    pub song: String,
    pub artist: String,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub album: Option<String>,
}

impl SongQuery {
    pub fn new(song: &str, artist: &str) -> Self {
        Self {
            song: song.to_string(),
            artist: artist.to_string(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if normalize_name(&self.song).is_empty() || normalize_name(&self.artist).is_empty() {
            return Err(Error::InvalidInput("song and artist are required".to_string()));
        }
        Ok(())
    }

    /// WHERE clause and its bind values, in order
    fn conditions(&self, matching: &MatchingConfig) -> (String, Vec<SongBind>) {
        let mut clauses = vec!["song_norm = ?", "artist_norm = ?"];
        let mut binds = vec![
            SongBind::Text(normalize_name(&self.song)),
            SongBind::Text(normalize_name(&self.artist)),
        ];

        if let Some(duration) = self.duration {
            clauses.push("ABS(duration - ?) <= ?");
            binds.push(SongBind::Int(duration));
            binds.push(SongBind::Int(matching.duration_tolerance));
        }
        if let Some(album) = self.album.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            clauses.push("album = ?");
            binds.push(SongBind::Text(album.to_string()));
        }

        (clauses.join(" AND "), binds)
    }
}

enum SongBind {
    Text(String),
    Int(i64),
}

async fn query_by_song(
    pool: &SqlitePool,
    query: &SongQuery,
    matching: &MatchingConfig,
    limit: i64,
) -> Result<Vec<Lyrics>> {
    query.validate()?;
    let (where_clause, binds) = query.conditions(matching);
    let sql = format!(
        "SELECT {} FROM lyrics WHERE {} ORDER BY score DESC, id ASC LIMIT ?",
        LYRICS_COLUMNS, where_clause
    );

    let mut q = sqlx::query(&sql);
    for bind in binds {
        q = match bind {
            SongBind::Text(value) => q.bind(value),
            SongBind::Int(value) => q.bind(value),
        };
    }
    let rows = q.bind(limit).fetch_all(pool).await?;

    rows.iter().map(lyrics_from_row).collect()
}

/// Highest raw-score document matching a song/artist lookup
pub async fn find_by_song_artist(
    pool: &SqlitePool,
    query: &SongQuery,
    matching: &MatchingConfig,
) -> Result<Option<Lyrics>> {
    Ok(query_by_song(pool, query, matching, 1).await?.into_iter().next())
}

/// Every document matching a song/artist lookup, best raw score first
pub async fn search_by_song_artist(
    pool: &SqlitePool,
    query: &SongQuery,
    matching: &MatchingConfig,
    limit: i64,
) -> Result<Vec<Lyrics>> {
    query_by_song(pool, query, matching, limit).await
}

/// Documents the next scoring cycle must rescore
///
/// Union of documents with a vote cast (or changed) after `since`, documents
/// never scored that have at least one vote, and documents that lost a vote
/// after `since`.
pub async fn lyrics_needing_rescore(pool: &SqlitePool, since: i64) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT lyrics_id FROM votes WHERE created_at > ?
        UNION
        SELECT id FROM lyrics
        WHERE score_updated_at IS NULL
          AND EXISTS (SELECT 1 FROM votes WHERE votes.lyrics_id = lyrics.id)
        UNION
        SELECT id FROM lyrics WHERE vote_retracted_at > ?
        ORDER BY 1
        "#,
    )
    .bind(since)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Persist the output of the scoring engine
///
/// Returns `false` when the document no longer exists.
pub async fn save_score_update<'e, E>(executor: E, update: &ScoreUpdate, now: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE lyrics SET
            effective_score = ?,
            vote_count = ?,
            diversity_bonus = ?,
            confidence = ?,
            score_updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.effective_score)
    .bind(update.vote_count)
    .bind(update.diversity_bonus)
    .bind(update.confidence.as_str())
    .bind(now)
    .bind(update.lyrics_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Documents with strong, well-supported consensus, as (id, effective score)
pub async fn consensus_candidates(
    pool: &SqlitePool,
    threshold: f64,
    min_votes: i64,
) -> Result<Vec<(i64, f64)>> {
    let rows: Vec<(i64, f64)> = sqlx::query_as(
        r#"
        SELECT id, effective_score FROM lyrics
        WHERE ABS(effective_score) > ?
          AND vote_count >= ?
        ORDER BY id
        "#,
    )
    .bind(threshold)
    .bind(min_votes)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
