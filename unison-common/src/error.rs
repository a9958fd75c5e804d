//! Error type shared by the Unison crates
//!
//! Duplicate votes, duplicate reports and protected documents are outcomes,
//! not errors; only conditions a caller cannot proceed from live here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database directory or reading the config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or inconsistent configuration; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lyric document or voter referenced by id does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected submission, vote value, report or stored enum text
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn lyrics_not_found(lyrics_id: i64) -> Self {
        Error::NotFound(format!("lyrics {}", lyrics_id))
    }

    pub fn voter_not_found(voter_id: i64) -> Self {
        Error::NotFound(format!("voter {}", voter_id))
    }
}
