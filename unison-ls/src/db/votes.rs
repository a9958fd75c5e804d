//! Vote ledger database operations
//!
//! Casting, changing and retracting a vote adjusts the document's raw
//! counters in the same transaction. The effective score is not touched
//! here; the next scoring cycle picks the change up.

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use unison_common::db::VoteDirection;
use unison_common::{Error, Result};

use super::voters::refresh_voter_statistics;
use crate::scoring::VoteInput;

/// Result of casting a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote by this voter on this document
    Recorded,
    /// Existing vote flipped to the other direction
    Changed,
    /// Same direction as the existing vote; nothing changed
    AlreadyVoted,
}

impl VoteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            VoteOutcome::Recorded => "Vote recorded",
            VoteOutcome::Changed => "Vote updated",
            VoteOutcome::AlreadyVoted => "Already voted",
        }
    }

    /// Whether any state changed
    pub fn applied(&self) -> bool {
        !matches!(self, VoteOutcome::AlreadyVoted)
    }
}

/// Result of retracting a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetractOutcome {
    Removed,
    NoVote,
}

impl RetractOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RetractOutcome::Removed => "Vote removed",
            RetractOutcome::NoVote => "No vote to remove",
        }
    }
}

/// Signed change to a document's raw counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterDelta {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

impl CounterDelta {
    /// Delta for a brand new vote
    pub fn for_new(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Self { upvotes: 1, downvotes: 0, score: 1 },
            VoteDirection::Down => Self { upvotes: 0, downvotes: 1, score: -1 },
        }
    }

    /// Delta for flipping an existing vote to `direction`
    pub fn for_change(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Self { upvotes: 1, downvotes: -1, score: 2 },
            VoteDirection::Down => Self { upvotes: -1, downvotes: 1, score: -2 },
        }
    }

    /// Delta that undoes a live vote in `direction`
    pub fn for_removal(direction: VoteDirection) -> Self {
        let new = Self::for_new(direction);
        Self {
            upvotes: -new.upvotes,
            downvotes: -new.downvotes,
            score: -new.score,
        }
    }
}

/// A vote row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub lyrics_id: i64,
    pub voter_id: i64,
    pub direction: VoteDirection,
    pub is_self_vote: bool,
    pub created_at: i64,
}

async fn apply_counter_delta(
    conn: &mut sqlx::SqliteConnection,
    lyrics_id: i64,
    delta: CounterDelta,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE lyrics SET
            upvotes = upvotes + ?,
            downvotes = downvotes + ?,
            score = score + ?
        WHERE id = ?
        "#,
    )
    .bind(delta.upvotes)
    .bind(delta.downvotes)
    .bind(delta.score)
    .bind(lyrics_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Cast (or change) a vote
///
/// The self-vote flag is fixed when the vote row is first inserted; a later
/// direction change keeps it.
pub async fn cast_vote(
    pool: &SqlitePool,
    lyrics_id: i64,
    voter_id: i64,
    direction: VoteDirection,
    now: i64,
) -> Result<VoteOutcome> {
    let mut tx = pool.begin().await?;

    // First statement is a write: takes the write lock and proves the
    // document exists before anything is read
    let touched = sqlx::query("UPDATE lyrics SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(lyrics_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::lyrics_not_found(lyrics_id));
    }

    let voter_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM voters WHERE id = ?")
        .bind(voter_id)
        .fetch_optional(&mut *tx)
        .await?;
    if voter_exists.is_none() {
        return Err(Error::voter_not_found(voter_id));
    }

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT vote FROM votes WHERE lyrics_id = ? AND voter_id = ?")
            .bind(lyrics_id)
            .bind(voter_id)
            .fetch_optional(&mut *tx)
            .await?;

    let outcome = match existing {
        Some(current) if current == direction.value() => {
            tx.rollback().await?;
            return Ok(VoteOutcome::AlreadyVoted);
        }
        Some(_) => {
            sqlx::query(
                "UPDATE votes SET vote = ?, created_at = ? WHERE lyrics_id = ? AND voter_id = ?",
            )
            .bind(direction.value())
            .bind(now)
            .bind(lyrics_id)
            .bind(voter_id)
            .execute(&mut *tx)
            .await?;

            apply_counter_delta(&mut tx, lyrics_id, CounterDelta::for_change(direction)).await?;
            VoteOutcome::Changed
        }
        None => {
            let submitter: Option<i64> =
                sqlx::query_scalar("SELECT submitter_id FROM lyrics WHERE id = ?")
                    .bind(lyrics_id)
                    .fetch_one(&mut *tx)
                    .await?;
            let is_self_vote = submitter == Some(voter_id);

            sqlx::query(
                r#"
                INSERT INTO votes (lyrics_id, voter_id, vote, is_self_vote, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(lyrics_id)
            .bind(voter_id)
            .bind(direction.value())
            .bind(is_self_vote)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            apply_counter_delta(&mut tx, lyrics_id, CounterDelta::for_new(direction)).await?;
            VoteOutcome::Recorded
        }
    };

    refresh_voter_statistics(&mut *tx, voter_id).await?;
    tx.commit().await?;

    Ok(outcome)
}

/// Retract a vote, reversing exactly the raw counter contribution it made
pub async fn remove_vote(
    pool: &SqlitePool,
    lyrics_id: i64,
    voter_id: i64,
    now: i64,
) -> Result<RetractOutcome> {
    let mut tx = pool.begin().await?;

    let touched = sqlx::query("UPDATE lyrics SET updated_at = ?, vote_retracted_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(lyrics_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::lyrics_not_found(lyrics_id));
    }

    let removed: Option<i64> =
        sqlx::query_scalar("DELETE FROM votes WHERE lyrics_id = ? AND voter_id = ? RETURNING vote")
            .bind(lyrics_id)
            .bind(voter_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(value) = removed else {
        tx.rollback().await?;
        return Ok(RetractOutcome::NoVote);
    };
    let direction = VoteDirection::try_from(value)?;

    apply_counter_delta(&mut tx, lyrics_id, CounterDelta::for_removal(direction)).await?;
    refresh_voter_statistics(&mut *tx, voter_id).await?;
    tx.commit().await?;

    Ok(RetractOutcome::Removed)
}

/// Load one vote
pub async fn get_vote(pool: &SqlitePool, lyrics_id: i64, voter_id: i64) -> Result<Option<Vote>> {
    let row = sqlx::query(
        r#"
        SELECT lyrics_id, voter_id, vote, is_self_vote, created_at
        FROM votes
        WHERE lyrics_id = ? AND voter_id = ?
        "#,
    )
    .bind(lyrics_id)
    .bind(voter_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(Vote {
            lyrics_id: row.get("lyrics_id"),
            voter_id: row.get("voter_id"),
            direction: VoteDirection::try_from(row.get::<i64, _>("vote"))?,
            is_self_vote: row.get("is_self_vote"),
            created_at: row.get("created_at"),
        })),
        None => Ok(None),
    }
}

/// Votes on a document joined with each voter's reputation and average
pub async fn votes_for_scoring(pool: &SqlitePool, lyrics_id: i64) -> Result<Vec<VoteInput>> {
    let rows = sqlx::query(
        r#"
        SELECT v.vote, u.reputation, u.avg_vote, v.is_self_vote
        FROM votes v
        JOIN voters u ON v.voter_id = u.id
        WHERE v.lyrics_id = ?
        "#,
    )
    .bind(lyrics_id)
    .fetch_all(pool)
    .await?;

    let mut votes = Vec::with_capacity(rows.len());
    for row in rows {
        votes.push(VoteInput {
            direction: VoteDirection::try_from(row.get::<i64, _>("vote"))?,
            reputation: row.get("reputation"),
            avg_vote: row.get("avg_vote"),
            is_self_vote: row.get("is_self_vote"),
        });
    }

    Ok(votes)
}

/// Non-self votes on a document, as (voter id, direction)
///
/// Self-votes are excluded here, so they never take part in consensus
/// feedback.
pub async fn feedback_votes(pool: &SqlitePool, lyrics_id: i64) -> Result<Vec<(i64, VoteDirection)>> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT voter_id, vote FROM votes WHERE lyrics_id = ? AND is_self_vote = 0 ORDER BY voter_id",
    )
    .bind(lyrics_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(voter_id, vote)| Ok((voter_id, VoteDirection::try_from(vote)?)))
        .collect()
}

/// Number of live votes on a document
pub async fn count_votes(pool: &SqlitePool, lyrics_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE lyrics_id = ?")
        .bind(lyrics_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
