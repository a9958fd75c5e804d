//! Background services

pub mod score_updater;

pub use score_updater::{ScoreUpdateReport, ScoreUpdater};
