//! Scoring engine and consensus feedback

pub mod engine;
pub mod feedback;

pub use engine::{calculate_score, confidence_tier, vote_weight, ScoreUpdate, VoteInput};
pub use feedback::{apply_consensus_feedback, feedback_delta, is_strong_consensus, FeedbackReport};
