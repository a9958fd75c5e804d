//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. The `[scoring]`
//! section carries every parameter the scoring engine, the consensus
//! feedback pass and the moderation gate read. The resulting values are
//! immutable after startup and handed to each component explicitly.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (handled by the binary)
//! 2. Environment variables (handled by the binary via clap `env`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the TOML file looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "unison-ls.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "UNISON_CONFIG";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime. The service must restart
/// to pick up changes to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file (relative or absolute)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scoring, moderation and scheduling parameters
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            logging: LoggingConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("unison.db")
}

fn default_port() -> u16 {
    5750
}

fn default_log_level() -> String {
    "info".to_string()
}

/// All semantically load-bearing scoring parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub protection: ProtectionConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Voter reputation bounds and the parameters of the vote → reputation loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Reputation assigned to a voter on first contact
    #[serde(default = "default_reputation")]
    pub default: f64,

    /// Lower reputation bound (inclusive)
    #[serde(default = "default_reputation_min")]
    pub min: f64,

    /// Upper reputation bound (inclusive)
    #[serde(default = "default_reputation_max")]
    pub max: f64,

    /// Multiplier applied to a voter's weight when voting on their own submission
    #[serde(default = "default_self_vote_weight")]
    pub self_vote_weight: f64,

    /// Votes required before a document can leave the "low" confidence tier
    #[serde(default = "default_min_votes_for_confidence")]
    pub min_votes_for_confidence: i64,

    /// Reputation change applied per qualifying vote by the feedback pass
    #[serde(default = "default_consensus_delta")]
    pub consensus_delta: f64,

    /// |effective score| above which a document counts as strong consensus
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            default: default_reputation(),
            min: default_reputation_min(),
            max: default_reputation_max(),
            self_vote_weight: default_self_vote_weight(),
            min_votes_for_confidence: default_min_votes_for_confidence(),
            consensus_delta: default_consensus_delta(),
            consensus_threshold: default_consensus_threshold(),
        }
    }
}

impl ReputationConfig {
    /// Clamp a reputation value into `[min, max]`
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

fn default_reputation() -> f64 {
    1.0
}

fn default_reputation_min() -> f64 {
    0.0
}

fn default_reputation_max() -> f64 {
    2.0
}

fn default_self_vote_weight() -> f64 {
    0.5
}

fn default_min_votes_for_confidence() -> i64 {
    5
}

fn default_consensus_delta() -> f64 {
    0.1
}

fn default_consensus_threshold() -> f64 {
    0.5
}

/// Raw-score threshold beyond which document content is immutable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Resubmission is refused once the raw score is at or above this value
    /// (enforced in the submission statement itself)
    #[serde(default = "default_min_score_to_protect")]
    pub min_score_to_protect: i64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            min_score_to_protect: default_min_score_to_protect(),
        }
    }
}

fn default_min_score_to_protect() -> i64 {
    5
}

/// Report-driven raw score penalty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Report count at which the penalty is deducted
    #[serde(default = "default_reports_before_penalty")]
    pub reports_before_penalty: i64,

    /// Amount subtracted from the raw score
    #[serde(default = "default_penalty_score_deduction")]
    pub penalty_score_deduction: i64,

    /// Deduct only on the first threshold crossing (`false` deducts on
    /// every report at or above the threshold)
    #[serde(default = "default_penalize_once")]
    pub penalize_once: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            reports_before_penalty: default_reports_before_penalty(),
            penalty_score_deduction: default_penalty_score_deduction(),
            penalize_once: default_penalize_once(),
        }
    }
}

fn default_reports_before_penalty() -> i64 {
    5
}

fn default_penalty_score_deduction() -> i64 {
    10
}

fn default_penalize_once() -> bool {
    true
}

/// Song/artist lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Accepted difference (seconds) between the requested and stored duration
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            duration_tolerance: default_duration_tolerance(),
        }
    }
}

fn default_duration_tolerance() -> i64 {
    2
}

/// Periodic score update driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the periodic driver at all (on-demand runs remain available)
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Seconds between scoring cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Trailing window for "recently voted" document selection
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,

    /// Documents scored concurrently within one cycle
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_secs: default_interval_secs(),
            lookback_secs: default_lookback_secs(),
            max_concurrent_documents: default_max_concurrent_documents(),
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    900
}

fn default_lookback_secs() -> u64 {
    3600
}

fn default_max_concurrent_documents() -> usize {
    4
}

impl ScoringConfig {
    /// Reject parameter combinations that would break the reputation bounds
    /// or the [-1, 1] range of effective scores
    pub fn validate(&self) -> Result<()> {
        let rep = &self.reputation;

        if !(rep.min.is_finite() && rep.max.is_finite() && rep.default.is_finite()) {
            return Err(Error::Config("reputation bounds must be finite".to_string()));
        }
        if rep.min < 0.0 {
            return Err(Error::Config(format!(
                "reputation.min must be >= 0 (got {})",
                rep.min
            )));
        }
        if rep.min > rep.max {
            return Err(Error::Config(format!(
                "reputation.min ({}) exceeds reputation.max ({})",
                rep.min, rep.max
            )));
        }
        if rep.default < rep.min || rep.default > rep.max {
            return Err(Error::Config(format!(
                "reputation.default ({}) outside [{}, {}]",
                rep.default, rep.min, rep.max
            )));
        }
        if !(0.0..=1.0).contains(&rep.self_vote_weight) {
            return Err(Error::Config(format!(
                "reputation.self_vote_weight must be within [0, 1] (got {})",
                rep.self_vote_weight
            )));
        }
        // An empty vote set must stay at "low" confidence
        if rep.min_votes_for_confidence < 1 {
            return Err(Error::Config(format!(
                "reputation.min_votes_for_confidence must be >= 1 (got {})",
                rep.min_votes_for_confidence
            )));
        }
        if !rep.consensus_delta.is_finite() || rep.consensus_delta < 0.0 {
            return Err(Error::Config(format!(
                "reputation.consensus_delta must be >= 0 (got {})",
                rep.consensus_delta
            )));
        }
        if !(0.0..1.0).contains(&rep.consensus_threshold) {
            return Err(Error::Config(format!(
                "reputation.consensus_threshold must be within [0, 1) (got {})",
                rep.consensus_threshold
            )));
        }
        if self.matching.duration_tolerance < 0 {
            return Err(Error::Config(format!(
                "matching.duration_tolerance must be >= 0 (got {})",
                self.matching.duration_tolerance
            )));
        }
        if self.moderation.reports_before_penalty < 1 {
            return Err(Error::Config(
                "moderation.reports_before_penalty must be >= 1".to_string(),
            ));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(Error::Config("scheduler.interval_secs must be > 0".to_string()));
        }
        if self.scheduler.max_concurrent_documents == 0 {
            return Err(Error::Config(
                "scheduler.max_concurrent_documents must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Config file resolution order:
/// 1. Command-line argument (highest priority)
/// 2. `UNISON_CONFIG` environment variable
/// 3. Platform config directory (`~/.config/unison/unison-ls.toml`)
/// 4. `unison-ls.toml` in the working directory
///
/// Returns `None` when no file exists; the caller then runs on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("unison").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    None
}

/// Parse a TOML configuration string
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
}

/// Load and validate the bootstrap configuration
///
/// A missing file is not an error when `path` is `None`: built-in defaults
/// apply. An explicitly named file that cannot be read is an error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
            })?;
            let config = parse_toml_config(&content)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.scoring.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ScoringConfig::default();
        assert_eq!(config.reputation.default, 1.0);
        assert_eq!(config.reputation.min, 0.0);
        assert_eq!(config.reputation.max, 2.0);
        assert_eq!(config.reputation.self_vote_weight, 0.5);
        assert_eq!(config.reputation.min_votes_for_confidence, 5);
        assert_eq!(config.reputation.consensus_delta, 0.1);
        assert_eq!(config.reputation.consensus_threshold, 0.5);
        assert_eq!(config.protection.min_score_to_protect, 5);
        assert_eq!(config.moderation.reports_before_penalty, 5);
        assert_eq!(config.moderation.penalty_score_deduction, 10);
        assert!(config.moderation.penalize_once);
        assert_eq!(config.scheduler.lookback_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config.port, 5750);
        assert_eq!(config.database_path, PathBuf::from("unison.db"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn test_partial_scoring_section_keeps_other_defaults() {
        let config = parse_toml_config(
            r#"
            port = 6000

            [scoring.reputation]
            max = 3.0
            consensus_delta = 0.25

            [scoring.moderation]
            penalize_once = false
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.scoring.reputation.max, 3.0);
        assert_eq!(config.scoring.reputation.consensus_delta, 0.25);
        assert_eq!(config.scoring.reputation.min, 0.0);
        assert!(!config.scoring.moderation.penalize_once);
        assert_eq!(config.scoring.moderation.reports_before_penalty, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_toml_config("port = \"not a number\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = ScoringConfig::default();
        config.reputation.min = 2.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_default_outside_bounds() {
        let mut config = ScoringConfig::default();
        config.reputation.default = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_min() {
        let mut config = ScoringConfig::default();
        config.reputation.min = -1.0;
        config.reputation.default = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_self_vote_weight_above_one() {
        let mut config = ScoringConfig::default();
        config.reputation.self_vote_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_min_votes_for_confidence() {
        let mut config = ScoringConfig::default();
        config.reputation.min_votes_for_confidence = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.reputation.min_votes_for_confidence = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_matching_section() {
        let config = parse_toml_config("[scoring.matching]\nduration_tolerance = 5\n").unwrap();
        assert_eq!(config.scoring.matching.duration_tolerance, 5);
        assert_eq!(ScoringConfig::default().matching.duration_tolerance, 2);

        let mut config = ScoringConfig::default();
        config.matching.duration_tolerance = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_concurrency() {
        let mut config = ScoringConfig::default();
        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.scheduler.max_concurrent_documents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_into_bounds() {
        let rep = ReputationConfig::default();
        assert_eq!(rep.clamp(-0.3), 0.0);
        assert_eq!(rep.clamp(2.7), 2.0);
        assert_eq!(rep.clamp(1.3), 1.3);
    }

    #[test]
    fn test_resolve_config_path_prefers_cli_argument() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
