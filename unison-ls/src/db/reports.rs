//! Report database operations and the report-count penalty

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use unison_common::config::ModerationConfig;
use unison_common::db::ReportReason;
use unison_common::{Error, Result};

/// Maximum length of free-form report details (characters)
pub const MAX_REPORT_DETAILS_LEN: usize = 1000;

/// Result of submitting a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Submitted { penalty_applied: bool },
    AlreadyReported,
}

impl ReportOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ReportOutcome::Submitted { .. } => "Report submitted",
            ReportOutcome::AlreadyReported => "Already reported",
        }
    }
}

/// Whether this report should deduct the penalty
///
/// `report_count` includes the report just inserted.
pub fn penalty_due(report_count: i64, already_penalized: bool, config: &ModerationConfig) -> bool {
    if report_count < config.reports_before_penalty {
        return false;
    }
    !(config.penalize_once && already_penalized)
}

/// Record a report; deduct the raw score penalty when the threshold is reached
pub async fn submit_report(
    pool: &SqlitePool,
    lyrics_id: i64,
    reporter_id: i64,
    reason: ReportReason,
    details: Option<&str>,
    config: &ModerationConfig,
    now: i64,
) -> Result<ReportOutcome> {
    let details = details.map(str::trim).filter(|d| !d.is_empty());
    if let Some(details) = details {
        if details.chars().count() > MAX_REPORT_DETAILS_LEN {
            return Err(Error::InvalidInput(format!(
                "report details exceed {} characters",
                MAX_REPORT_DETAILS_LEN
            )));
        }
    }

    let mut tx = pool.begin().await?;

    // No-op write: takes the write lock and proves the document exists
    let touched = sqlx::query("UPDATE lyrics SET penalty_applied = penalty_applied WHERE id = ?")
        .bind(lyrics_id)
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::lyrics_not_found(lyrics_id));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO reports (lyrics_id, voter_id, reason, details, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(lyrics_id, voter_id) DO NOTHING
        "#,
    )
    .bind(lyrics_id)
    .bind(reporter_id)
    .bind(reason.as_str())
    .bind(details)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(ReportOutcome::AlreadyReported);
    }

    let report_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE lyrics_id = ?")
        .bind(lyrics_id)
        .fetch_one(&mut *tx)
        .await?;
    let already_penalized: bool =
        sqlx::query_scalar("SELECT penalty_applied FROM lyrics WHERE id = ?")
            .bind(lyrics_id)
            .fetch_one(&mut *tx)
            .await?;

    let penalty_applied = penalty_due(report_count, already_penalized, config);
    if penalty_applied {
        sqlx::query("UPDATE lyrics SET score = score - ?, penalty_applied = 1 WHERE id = ?")
            .bind(config.penalty_score_deduction)
            .bind(lyrics_id)
            .execute(&mut *tx)
            .await?;
        info!(
            "Lyrics {} reached {} reports, deducted {} from raw score",
            lyrics_id, report_count, config.penalty_score_deduction
        );
    }

    tx.commit().await?;

    Ok(ReportOutcome::Submitted { penalty_applied })
}

/// Number of reports filed against a document
pub async fn count_reports(pool: &SqlitePool, lyrics_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE lyrics_id = ?")
        .bind(lyrics_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
