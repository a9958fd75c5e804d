//! Consensus feedback: voter reputation follows agreement with strong consensus
//!
//! For every document whose |effective score| exceeds the consensus
//! threshold with enough votes, each non-self voter is nudged by
//! ±`consensus_delta`. One adjustment per qualifying vote, applied
//! sequentially, each clamped into the reputation bounds.
//!
//! The pass is not idempotent: running it again over unchanged votes
//! applies the same deltas again.

use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use unison_common::config::ReputationConfig;
use unison_common::db::VoteDirection;
use unison_common::Result;

use crate::db::{lyrics, voters, votes};

/// Aggregate outcome of one feedback pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackReport {
    /// Consensus documents processed
    pub documents: usize,
    /// Consensus documents whose votes could not be loaded
    pub documents_failed: usize,
    /// Reputation adjustments written
    pub applied: usize,
    /// Reputation adjustments that failed to persist
    pub failed: usize,
}

/// Reputation delta for a vote given the document's consensus direction
pub fn feedback_delta(vote: VoteDirection, consensus: VoteDirection, config: &ReputationConfig) -> f64 {
    if vote == consensus {
        config.consensus_delta
    } else {
        -config.consensus_delta
    }
}

/// Whether a scored document qualifies for consensus feedback
pub fn is_strong_consensus(effective_score: f64, vote_count: i64, config: &ReputationConfig) -> bool {
    effective_score.abs() > config.consensus_threshold && vote_count >= config.min_votes_for_confidence
}

/// Apply consensus feedback over every qualifying document
///
/// Only the candidate query failing aborts the pass. A document whose votes
/// cannot be loaded, or a voter whose adjustment fails, is logged and
/// counted; processing continues with the rest. Cancellation lets the
/// current voter finish and stops issuing new adjustments.
pub async fn apply_consensus_feedback(
    pool: &SqlitePool,
    config: &ReputationConfig,
    cancel: &CancellationToken,
) -> Result<FeedbackReport> {
    let candidates = lyrics::consensus_candidates(
        pool,
        config.consensus_threshold,
        config.min_votes_for_confidence,
    )
    .await?;

    let mut report = FeedbackReport::default();

    'documents: for (lyrics_id, effective_score) in candidates {
        if cancel.is_cancelled() {
            break;
        }
        let Some(consensus) = VoteDirection::of_score(effective_score) else {
            continue;
        };
        report.documents += 1;

        let document_votes = match votes::feedback_votes(pool, lyrics_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Consensus feedback: failed to load votes for lyrics {}: {}", lyrics_id, e);
                report.documents_failed += 1;
                continue;
            }
        };

        for (voter_id, direction) in document_votes {
            if cancel.is_cancelled() {
                break 'documents;
            }
            let delta = feedback_delta(direction, consensus, config);
            match voters::adjust_reputation(pool, voter_id, delta, config).await {
                Ok(reputation) => {
                    debug!(
                        "Voter {} reputation {:+} -> {:.3} (lyrics {})",
                        voter_id, delta, reputation, lyrics_id
                    );
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(
                        "Consensus feedback: failed to adjust voter {} for lyrics {}: {}",
                        voter_id, lyrics_id, e
                    );
                    report.failed += 1;
                }
            }
        }
    }

    Ok(report)
}
