//! Voter (identity store) database operations
//!
//! Reputation is only ever written through [`adjust_reputation`], which
//! clamps into the configured bounds in the same statement.

use sqlx::{Executor, Sqlite, SqlitePool};
use unison_common::config::ReputationConfig;
use unison_common::db::Voter;
use unison_common::{Error, Result};

/// Look up a voter by hashed identity, creating it on first contact
///
/// Safe under concurrent first contact: the insert is a no-op when another
/// request created the row first.
pub async fn get_or_create_voter(
    pool: &SqlitePool,
    device_hash: &str,
    config: &ReputationConfig,
    now: i64,
) -> Result<Voter> {
    sqlx::query(
        r#"
        INSERT INTO voters (device_hash, reputation, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(device_hash) DO NOTHING
        "#,
    )
    .bind(device_hash)
    .bind(config.clamp(config.default))
    .bind(now)
    .execute(pool)
    .await?;

    let voter = sqlx::query_as::<_, Voter>(
        "SELECT id, device_hash, reputation, avg_vote, vote_count, created_at FROM voters WHERE device_hash = ?",
    )
    .bind(device_hash)
    .fetch_one(pool)
    .await?;

    Ok(voter)
}

/// Load a voter by id
pub async fn get_voter(pool: &SqlitePool, voter_id: i64) -> Result<Option<Voter>> {
    let voter = sqlx::query_as::<_, Voter>(
        "SELECT id, device_hash, reputation, avg_vote, vote_count, created_at FROM voters WHERE id = ?",
    )
    .bind(voter_id)
    .fetch_optional(pool)
    .await?;

    Ok(voter)
}

/// Add `delta` to a voter's reputation, clamped into `[min, max]`
///
/// Single read-modify-write statement; returns the new reputation.
pub async fn adjust_reputation(
    pool: &SqlitePool,
    voter_id: i64,
    delta: f64,
    config: &ReputationConfig,
) -> Result<f64> {
    let reputation: Option<f64> = sqlx::query_scalar(
        r#"
        UPDATE voters SET reputation = MAX(?, MIN(?, reputation + ?))
        WHERE id = ?
        RETURNING reputation
        "#,
    )
    .bind(config.min)
    .bind(config.max)
    .bind(delta)
    .bind(voter_id)
    .fetch_optional(pool)
    .await?;

    reputation.ok_or_else(|| Error::voter_not_found(voter_id))
}

/// Recompute every voter's rolling average vote and vote count
///
/// Returns the number of voter rows refreshed.
pub async fn refresh_vote_statistics(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE voters SET
            avg_vote = COALESCE((SELECT AVG(vote) FROM votes WHERE votes.voter_id = voters.id), 0),
            vote_count = (SELECT COUNT(*) FROM votes WHERE votes.voter_id = voters.id)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Recompute one voter's rolling average vote and vote count
///
/// Accepts any executor so vote casting can run it inside its transaction.
pub async fn refresh_voter_statistics<'e, E>(executor: E, voter_id: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE voters SET
            avg_vote = COALESCE((SELECT AVG(vote) FROM votes WHERE voter_id = ?), 0),
            vote_count = (SELECT COUNT(*) FROM votes WHERE voter_id = ?)
        WHERE id = ?
        "#,
    )
    .bind(voter_id)
    .bind(voter_id)
    .bind(voter_id)
    .execute(executor)
    .await?;

    Ok(())
}
