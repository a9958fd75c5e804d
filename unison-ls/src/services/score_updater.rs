//! Periodic score update driver
//!
//! One cycle runs in two phases that never interleave:
//! 1. Refresh voter statistics, select the documents to rescore, score each
//!    one and persist the result (documents run concurrently, each
//!    independently).
//! 2. Consensus feedback over every strong-consensus document, reading the
//!    freshly persisted scores.
//!
//! Cycles never overlap: a run requested while another is in progress is
//! refused rather than queued.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use unison_common::time::{unix_now, window_start};
use unison_common::{Result, ScoringConfig};

use crate::db::{lyrics, voters, votes};
use crate::scoring::{apply_consensus_feedback, calculate_score, is_strong_consensus, ScoreUpdate};

/// Aggregate outcome of one scoring cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreUpdateReport {
    /// Documents selected for rescoring
    pub selected: usize,
    /// Documents whose new score was persisted
    pub updated: usize,
    /// Documents skipped because of a storage failure (retried next cycle)
    pub failed: usize,
    /// Rescored documents now at strong consensus
    pub strong_consensus: usize,
    /// Consensus documents visited by the feedback phase
    pub feedback_documents: usize,
    /// Reputation adjustments written by the feedback phase
    pub adjustments_applied: usize,
    /// Reputation adjustments (or document vote loads) that failed
    pub adjustments_failed: usize,
    /// Cancellation stopped the cycle before it finished
    pub cancelled: bool,
}

/// Score update driver
pub struct ScoreUpdater {
    db: SqlitePool,
    config: Arc<ScoringConfig>,
    cancel: CancellationToken,
    cycle_lock: Mutex<()>,
}

impl ScoreUpdater {
    /// Create a new driver
    pub fn new(db: SqlitePool, config: Arc<ScoringConfig>, cancel: CancellationToken) -> Self {
        Self {
            db,
            config,
            cancel,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Run one cycle now
    ///
    /// Returns `Ok(None)` when another cycle is already running.
    pub async fn run_cycle(&self) -> Result<Option<ScoreUpdateReport>> {
        self.run_cycle_at(unix_now()).await
    }

    /// Run one cycle as of `now` (Unix seconds)
    pub async fn run_cycle_at(&self, now: i64) -> Result<Option<ScoreUpdateReport>> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("Score update already running, skipping");
            return Ok(None);
        };

        self.execute_cycle(now).await.map(Some)
    }

    async fn execute_cycle(&self, now: i64) -> Result<ScoreUpdateReport> {
        let mut report = ScoreUpdateReport::default();

        // Stale averages only weaken the diversity signal for one cycle
        match voters::refresh_vote_statistics(&self.db).await {
            Ok(count) => debug!("Refreshed vote statistics for {} voters", count),
            Err(e) => warn!("Failed to refresh voter statistics, using previous values: {}", e),
        }

        let since = window_start(now, self.config.scheduler.lookback_secs);
        let selected = lyrics::lyrics_needing_rescore(&self.db, since).await?;
        report.selected = selected.len();

        // Phase 1: score and persist
        let concurrency = self.config.scheduler.max_concurrent_documents.max(1);
        let results: Vec<(i64, Result<Option<ScoreUpdate>>)> = stream::iter(selected)
            .take_while(|_| futures::future::ready(!self.cancel.is_cancelled()))
            .map(|lyrics_id| async move { (lyrics_id, self.score_document(lyrics_id, now).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (lyrics_id, result) in &results {
            match result {
                Ok(Some(update)) => {
                    report.updated += 1;
                    if is_strong_consensus(
                        update.effective_score,
                        update.vote_count,
                        &self.config.reputation,
                    ) {
                        report.strong_consensus += 1;
                    }
                }
                Ok(None) => debug!("Lyrics {} disappeared before its score was saved", lyrics_id),
                Err(e) => {
                    warn!("Failed to rescore lyrics {}: {}", lyrics_id, e);
                    report.failed += 1;
                }
            }
        }

        if self.cancel.is_cancelled() {
            report.cancelled = true;
            info!(
                "Score update cancelled after scoring {} of {} lyrics; feedback skipped",
                report.updated, report.selected
            );
            return Ok(report);
        }

        // Phase 2: consensus feedback over the persisted scores
        match apply_consensus_feedback(&self.db, &self.config.reputation, &self.cancel).await {
            Ok(feedback) => {
                report.feedback_documents = feedback.documents;
                report.adjustments_applied = feedback.applied;
                report.adjustments_failed = feedback.failed + feedback.documents_failed;
            }
            Err(e) => {
                warn!("Consensus feedback pass failed: {}", e);
            }
        }
        report.cancelled = self.cancel.is_cancelled();

        info!(
            "Score update completed: {} selected, {} updated, {} failed, {} reputation adjustments ({} failed)",
            report.selected,
            report.updated,
            report.failed,
            report.adjustments_applied,
            report.adjustments_failed
        );

        Ok(report)
    }

    /// Load, score and persist one document
    ///
    /// `Ok(None)` when the document was deleted in between.
    async fn score_document(&self, lyrics_id: i64, now: i64) -> Result<Option<ScoreUpdate>> {
        let document_votes = votes::votes_for_scoring(&self.db, lyrics_id).await?;
        let update = calculate_score(lyrics_id, &document_votes, &self.config.reputation);

        if lyrics::save_score_update(&self.db, &update, now).await? {
            debug!(
                "Lyrics {}: effective score {:.3} over {} votes ({})",
                lyrics_id, update.effective_score, update.vote_count, update.confidence
            );
            Ok(Some(update))
        } else {
            Ok(None)
        }
    }

    /// Run cycles on a fixed interval until cancelled
    ///
    /// The first cycle runs immediately. Missed ticks are skipped, never
    /// bunched up.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.scheduler.interval_secs);
        info!(
            "Starting score updater (interval: {}s, lookback: {}s)",
            self.config.scheduler.interval_secs, self.config.scheduler.lookback_secs
        );

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }

                match self.run_cycle().await {
                    Ok(Some(_)) => {}
                    Ok(None) => debug!("Scheduled score update skipped: previous cycle still running"),
                    Err(e) => error!("Scheduled score update failed: {}", e),
                }
            }

            info!("Score updater stopped");
        })
    }
}
