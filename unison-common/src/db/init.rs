//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently
//! on every start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Per-connection pragmas: every pooled connection needs them
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single writer (vote
    // requests keep reading while the scoring cycle writes)
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_voters_table(pool).await?;
    create_lyrics_table(pool).await?;
    create_votes_table(pool).await?;
    create_reports_table(pool).await?;
    Ok(())
}

/// Create the voters table
///
/// One row per hashed device identity. `avg_vote` and `vote_count` are
/// derived from the votes table by the statistics refresh.
pub async fn create_voters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS voters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_hash TEXT NOT NULL UNIQUE,
            reputation REAL NOT NULL DEFAULT 1.0,
            avg_vote REAL NOT NULL DEFAULT 0.0,
            vote_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the lyrics table
///
/// `score`, `upvotes` and `downvotes` are raw counters maintained by vote
/// casting and moderation. `effective_score`, `vote_count`,
/// `diversity_bonus`, `confidence` and `score_updated_at` are written only
/// by the scoring cycle. `song_norm` / `artist_norm` are the lookup keys
/// for song/artist matching.
pub async fn create_lyrics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lyrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            video_id TEXT NOT NULL UNIQUE,
            song TEXT NOT NULL,
            artist TEXT NOT NULL,
            song_norm TEXT NOT NULL DEFAULT '',
            artist_norm TEXT NOT NULL DEFAULT '',
            album TEXT,
            duration INTEGER NOT NULL,
            lyrics TEXT NOT NULL,
            format TEXT NOT NULL,
            language TEXT,
            sync_type TEXT NOT NULL DEFAULT 'linesync',
            score INTEGER NOT NULL DEFAULT 0,
            upvotes INTEGER NOT NULL DEFAULT 0,
            downvotes INTEGER NOT NULL DEFAULT 0,
            effective_score REAL NOT NULL DEFAULT 0.0,
            vote_count INTEGER NOT NULL DEFAULT 0,
            diversity_bonus INTEGER NOT NULL DEFAULT 0,
            confidence TEXT NOT NULL DEFAULT 'low',
            score_updated_at INTEGER,
            vote_retracted_at INTEGER,
            penalty_applied INTEGER NOT NULL DEFAULT 0,
            submitter_id INTEGER REFERENCES voters(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lyrics_effective_score ON lyrics(effective_score)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lyrics_song_artist ON lyrics(song_norm, artist_norm)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the votes table
///
/// The composite primary key enforces one live vote per (document, voter).
pub async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            lyrics_id INTEGER NOT NULL REFERENCES lyrics(id) ON DELETE CASCADE,
            voter_id INTEGER NOT NULL REFERENCES voters(id),
            vote INTEGER NOT NULL CHECK (vote IN (-1, 1)),
            is_self_vote INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (lyrics_id, voter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_created_at ON votes(created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_voter_id ON votes(voter_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the reports table
pub async fn create_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lyrics_id INTEGER NOT NULL REFERENCES lyrics(id) ON DELETE CASCADE,
            voter_id INTEGER NOT NULL REFERENCES voters(id),
            reason TEXT NOT NULL,
            details TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE (lyrics_id, voter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_lyrics_id ON reports(lyrics_id)")
        .execute(pool)
        .await?;

    Ok(())
}
