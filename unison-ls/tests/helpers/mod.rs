//! Shared fixtures for unison-ls integration tests
#![allow(dead_code)]

use sqlx::SqlitePool;
use tempfile::TempDir;
use unison_common::config::ReputationConfig;
use unison_common::db::{LyricsFormat, SyncType};
use unison_ls::db::lyrics::{self, LyricsSubmission};
use unison_ls::db::{init_database, voters as voter_db};

/// File-backed test database; removed when dropped
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("unison.db")).await.unwrap();
        Self { pool, _dir: dir }
    }
}

pub fn submission(video_id: &str) -> LyricsSubmission {
    LyricsSubmission {
        video_id: video_id.to_string(),
        song: "Never Gonna Give You Up".to_string(),
        artist: "Rick Astley".to_string(),
        album: None,
        duration: 213,
        lyrics: "[00:18.00] We're no strangers to love".to_string(),
        format: LyricsFormat::Lrc,
        language: Some("en".to_string()),
        sync_type: SyncType::Linesync,
    }
}

/// Create (or look up) a voter with the default reputation
pub async fn voter(pool: &SqlitePool, device: &str) -> i64 {
    voter_db::get_or_create_voter(pool, device, &ReputationConfig::default(), 0)
        .await
        .unwrap()
        .id
}

/// Create `count` distinct voters
pub async fn voters(pool: &SqlitePool, prefix: &str, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        ids.push(voter(pool, &format!("{}-{}", prefix, i)).await);
    }
    ids
}

/// Submit a document and return its id
pub async fn document(pool: &SqlitePool, video_id: &str, submitter: Option<i64>) -> i64 {
    lyrics::submit_lyrics(pool, &submission(video_id), submitter, &Default::default(), 0)
        .await
        .unwrap()
        .id()
}

pub async fn reputation(pool: &SqlitePool, voter_id: i64) -> f64 {
    voter_db::get_voter(pool, voter_id).await.unwrap().unwrap().reputation
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
