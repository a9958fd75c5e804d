//! Database models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persistent voter record keyed by a hashed device identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Voter {
    pub id: i64,
    pub device_hash: String,
    pub reputation: f64,
    pub avg_vote: f64,
    pub vote_count: i64,
    pub created_at: i64,
}

/// Direction of a single vote (+1 / -1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Signed integer value as stored in the votes table
    pub fn value(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    /// Signed value as a weight multiplier
    pub fn sign(self) -> f64 {
        self.value() as f64
    }

    /// Direction of a non-zero score (`None` for exactly zero)
    pub fn of_score(score: f64) -> Option<Self> {
        if score > 0.0 {
            Some(VoteDirection::Up)
        } else if score < 0.0 {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }
}

impl TryFrom<i64> for VoteDirection {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(VoteDirection::Up),
            -1 => Ok(VoteDirection::Down),
            other => Err(Error::InvalidInput(format!(
                "vote must be 1 or -1 (got {})",
                other
            ))),
        }
    }
}

impl Serialize for VoteDirection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for VoteDirection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        VoteDirection::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Coarse reliability label derived from vote volume and diversity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(Error::InvalidInput(format!("unknown confidence '{}'", other))),
        }
    }
}

/// Lyric text format as declared by the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricsFormat {
    Ttml,
    Lrc,
    Plain,
}

impl LyricsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LyricsFormat::Ttml => "ttml",
            LyricsFormat::Lrc => "lrc",
            LyricsFormat::Plain => "plain",
        }
    }
}

impl FromStr for LyricsFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ttml" => Ok(LyricsFormat::Ttml),
            "lrc" => Ok(LyricsFormat::Lrc),
            "plain" => Ok(LyricsFormat::Plain),
            other => Err(Error::InvalidInput(format!("unknown lyrics format '{}'", other))),
        }
    }
}

/// Timing granularity of a lyric document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Richsync,
    #[default]
    Linesync,
    Plain,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Richsync => "richsync",
            SyncType::Linesync => "linesync",
            SyncType::Plain => "plain",
        }
    }
}

impl FromStr for SyncType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "richsync" => Ok(SyncType::Richsync),
            "linesync" => Ok(SyncType::Linesync),
            "plain" => Ok(SyncType::Plain),
            other => Err(Error::InvalidInput(format!("unknown sync type '{}'", other))),
        }
    }
}

/// Why a reporter flagged a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    WrongSong,
    BadSync,
    Offensive,
    Spam,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::WrongSong => "wrong_song",
            ReportReason::BadSync => "bad_sync",
            ReportReason::Offensive => "offensive",
            ReportReason::Spam => "spam",
            ReportReason::Other => "other",
        }
    }
}

/// Lyric document row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lyrics {
    pub id: i64,
    pub video_id: String,
    pub song: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: i64,
    pub lyrics: String,
    pub format: LyricsFormat,
    pub language: Option<String>,
    pub sync_type: SyncType,
    /// Raw score: sum of +1/-1 votes minus moderation penalties
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    /// Reputation-weighted consensus score in [-1, 1]
    pub effective_score: f64,
    /// Votes considered by the last scoring cycle
    pub vote_count: i64,
    pub diversity_bonus: bool,
    pub confidence: Confidence,
    pub score_updated_at: Option<i64>,
    /// Last time a vote on this document was retracted
    pub vote_retracted_at: Option<i64>,
    pub penalty_applied: bool,
    pub submitter_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
