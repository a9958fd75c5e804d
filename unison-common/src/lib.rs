//! # Unison Common Library
//!
//! Shared code for the Unison lyrics services including:
//! - Database initialization and row models
//! - Configuration loading (TOML bootstrap + scoring parameters)
//! - Voter identity hashing and song/artist lookup keys
//! - Error types and time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod normalize;
pub mod time;

pub use config::ScoringConfig;
pub use error::{Error, Result};
