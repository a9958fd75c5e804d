//! Reputation-weighted consensus scoring
//!
//! Pure computation over a document's votes. The score update driver loads
//! the inputs and persists the result; nothing here touches storage.

use serde::Serialize;
use unison_common::config::ReputationConfig;
use unison_common::db::{Confidence, VoteDirection};

/// One vote joined with its voter's current standing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteInput {
    pub direction: VoteDirection,
    /// Voter reputation at load time
    pub reputation: f64,
    /// Voter's rolling average vote (negative = habitually harsh)
    pub avg_vote: f64,
    pub is_self_vote: bool,
}

/// Result of scoring one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreUpdate {
    pub lyrics_id: i64,
    pub effective_score: f64,
    pub vote_count: i64,
    pub diversity_bonus: bool,
    pub confidence: Confidence,
}

/// Weight a vote contributes: voter reputation, discounted for self-votes
pub fn vote_weight(vote: &VoteInput, config: &ReputationConfig) -> f64 {
    let reputation = vote.reputation.max(0.0);
    if vote.is_self_vote {
        reputation * config.self_vote_weight
    } else {
        reputation
    }
}

/// Confidence tier for a vote count and diversity outcome
///
/// Below the minimum vote count, and always for an empty vote set, the tier
/// is `Low`.
pub fn confidence_tier(vote_count: i64, diversity_bonus: bool, min_votes: i64) -> Confidence {
    if vote_count == 0 || vote_count < min_votes {
        Confidence::Low
    } else if diversity_bonus {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Compute the effective score, diversity bonus and confidence of a document
///
/// The effective score is a weighted average of ±1 values and therefore
/// always lies in [-1, 1]. Zero total weight (no votes, or only
/// zero-reputation voters) yields 0.
pub fn calculate_score(lyrics_id: i64, votes: &[VoteInput], config: &ReputationConfig) -> ScoreUpdate {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut harsh_upvotes = 0usize;
    let mut generous_upvotes = 0usize;

    for vote in votes {
        let weight = vote_weight(vote, config);
        weighted_sum += vote.direction.sign() * weight;
        total_weight += weight;

        // Only upvotes take part in diversity tracking
        if vote.direction == VoteDirection::Up {
            if vote.avg_vote < 0.0 {
                harsh_upvotes += 1;
            } else {
                generous_upvotes += 1;
            }
        }
    }

    let effective_score = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };
    let diversity_bonus = harsh_upvotes > 0 && generous_upvotes > 0;
    let vote_count = votes.len() as i64;

    ScoreUpdate {
        lyrics_id,
        effective_score,
        vote_count,
        diversity_bonus,
        confidence: confidence_tier(vote_count, diversity_bonus, config.min_votes_for_confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(direction: VoteDirection, reputation: f64, avg_vote: f64, is_self_vote: bool) -> VoteInput {
        VoteInput {
            direction,
            reputation,
            avg_vote,
            is_self_vote,
        }
    }

    fn up(reputation: f64) -> VoteInput {
        vote(VoteDirection::Up, reputation, 0.0, false)
    }

    fn down(reputation: f64) -> VoteInput {
        vote(VoteDirection::Down, reputation, 0.0, false)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_empty_vote_set() {
        let update = calculate_score(7, &[], &ReputationConfig::default());
        assert_eq!(update.lyrics_id, 7);
        assert_eq!(update.effective_score, 0.0);
        assert_eq!(update.vote_count, 0);
        assert!(!update.diversity_bonus);
        assert_eq!(update.confidence, Confidence::Low);
    }

    #[test]
    fn test_empty_vote_set_is_low_without_a_vote_minimum() {
        let config = ReputationConfig {
            min_votes_for_confidence: 0,
            ..ReputationConfig::default()
        };
        let update = calculate_score(3, &[], &config);
        assert_eq!(update.confidence, Confidence::Low);
        assert_eq!(confidence_tier(0, false, 0), Confidence::Low);
        assert_eq!(confidence_tier(1, false, 0), Confidence::Medium);
    }

    #[test]
    fn test_zero_reputation_voters_are_fully_discounted() {
        let votes = [up(0.0), up(0.0), down(0.0)];
        let update = calculate_score(1, &votes, &ReputationConfig::default());
        assert_eq!(update.effective_score, 0.0);
        assert_eq!(update.vote_count, 3);
    }

    #[test]
    fn test_zero_reputation_voter_does_not_dilute_others() {
        let votes = [up(1.0), down(0.0)];
        let update = calculate_score(1, &votes, &ReputationConfig::default());
        assert_close(update.effective_score, 1.0);
    }

    #[test]
    fn test_self_vote_weight_is_half() {
        let config = ReputationConfig::default();
        let own = vote(VoteDirection::Up, 1.0, 0.0, true);
        let other = vote(VoteDirection::Up, 1.0, 0.0, false);
        assert_close(vote_weight(&own, &config), 0.5);
        assert_close(vote_weight(&other, &config), 1.0);

        let update = calculate_score(1, &[own, other], &config);
        assert_close(update.effective_score, 1.0);
    }

    #[test]
    fn test_self_upvote_against_downvote() {
        // (0.5 - 1.0) / 1.5
        let votes = [vote(VoteDirection::Up, 1.0, 0.0, true), down(1.0)];
        let update = calculate_score(1, &votes, &ReputationConfig::default());
        assert_close(update.effective_score, -1.0 / 3.0);
    }

    #[test]
    fn test_mixed_reputation_weighting() {
        let votes = [up(2.0), down(0.5)];
        let update = calculate_score(1, &votes, &ReputationConfig::default());
        assert_close(update.effective_score, 0.6);
    }

    #[test]
    fn test_configured_self_vote_weight() {
        let config = ReputationConfig {
            self_vote_weight: 0.0,
            ..ReputationConfig::default()
        };
        let votes = [vote(VoteDirection::Down, 2.0, 0.0, true), up(1.0)];
        let update = calculate_score(1, &votes, &config);
        assert_close(update.effective_score, 1.0);
    }

    #[test]
    fn test_effective_score_stays_within_unit_range() {
        let config = ReputationConfig::default();
        let reputations = [0.0, 0.1, 0.5, 1.0, 1.7, 2.0];
        for (i, &a) in reputations.iter().enumerate() {
            for &b in &reputations[i..] {
                for &c in &reputations {
                    let votes = [
                        up(a),
                        down(b),
                        vote(VoteDirection::Up, c, -0.4, true),
                        vote(VoteDirection::Down, c, 0.2, true),
                    ];
                    let score = calculate_score(1, &votes, &config).effective_score;
                    assert!((-1.0..=1.0).contains(&score), "score {} out of range", score);
                }
            }
        }
    }

    #[test]
    fn test_diversity_requires_harsh_and_generous_upvoters() {
        let votes = [
            vote(VoteDirection::Up, 1.0, -0.5, false),
            vote(VoteDirection::Up, 1.0, 0.5, false),
        ];
        assert!(calculate_score(1, &votes, &ReputationConfig::default()).diversity_bonus);
    }

    #[test]
    fn test_downvotes_never_contribute_to_diversity() {
        let votes = [
            vote(VoteDirection::Up, 1.0, 0.5, false),
            vote(VoteDirection::Up, 1.0, 0.3, false),
            vote(VoteDirection::Down, 1.0, -0.2, false),
        ];
        assert!(!calculate_score(1, &votes, &ReputationConfig::default()).diversity_bonus);
    }

    #[test]
    fn test_no_upvotes_never_earns_diversity() {
        let votes = [
            vote(VoteDirection::Down, 1.0, -0.9, false),
            vote(VoteDirection::Down, 1.0, 0.9, false),
        ];
        assert!(!calculate_score(1, &votes, &ReputationConfig::default()).diversity_bonus);
    }

    #[test]
    fn test_zero_average_counts_as_generous() {
        let votes = [
            vote(VoteDirection::Up, 1.0, 0.0, false),
            vote(VoteDirection::Up, 1.0, -0.01, false),
        ];
        assert!(calculate_score(1, &votes, &ReputationConfig::default()).diversity_bonus);
    }

    #[test]
    fn test_confidence_gating() {
        let config = ReputationConfig::default();
        let diverse = |n: usize| -> Vec<VoteInput> {
            (0..n)
                .map(|i| {
                    let avg = if i % 2 == 0 { -0.5 } else { 0.5 };
                    vote(VoteDirection::Up, 1.0, avg, false)
                })
                .collect()
        };
        let uniform = |n: usize| -> Vec<VoteInput> { (0..n).map(|_| up(1.0)).collect() };

        let four = calculate_score(1, &diverse(4), &config);
        assert!(four.diversity_bonus);
        assert_eq!(four.confidence, Confidence::Low);

        assert_eq!(calculate_score(1, &diverse(5), &config).confidence, Confidence::High);
        assert_eq!(calculate_score(1, &uniform(5), &config).confidence, Confidence::Medium);
        assert_eq!(calculate_score(1, &uniform(12), &config).confidence, Confidence::Medium);
    }

    #[test]
    fn test_confidence_tier_is_monotonic_in_vote_count() {
        for diversity in [false, true] {
            let mut previous = Confidence::Low;
            for count in 0..20 {
                let tier = confidence_tier(count, diversity, 5);
                let rank = |c: Confidence| match c {
                    Confidence::Low => 0,
                    Confidence::Medium => 1,
                    Confidence::High => 2,
                };
                assert!(rank(tier) >= rank(previous));
                previous = tier;
            }
        }
    }
}
