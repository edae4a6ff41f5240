use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CadenceError, Result};
use crate::types::{normalize_tags, ProbabilityPolicy};

/// Top-level configuration for Cadence.
///
/// Loaded from `~/.cadence/config.toml` by default. Each section corresponds
/// to one concern of an engagement run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub policy: ProbabilityPolicy,
}

impl CadenceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CadenceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check every section that a run depends on.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        self.pacing.validate()?;
        self.policy.validate()
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the action ledger.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.cadence/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// What a run engages with and how much of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Topic tags to browse.
    pub hashtags: Vec<String>,
    /// Tags that disable commenting on any item carrying them.
    pub avoid_hashtags: Vec<String>,
    pub likes_per_day: u32,
    pub comments_per_day: u32,
    /// Forwarded to the comment generator.
    pub allow_sensitive: bool,
    /// Candidates fetched per topic tag.
    pub per_tag_limit: usize,
    /// Upper bound on a single collaborator call.
    pub call_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            hashtags: Vec::new(),
            avoid_hashtags: Vec::new(),
            likes_per_day: 50,
            comments_per_day: 15,
            allow_sensitive: true,
            per_tag_limit: 10,
            call_timeout_secs: 60,
        }
    }
}

impl RunConfig {
    /// Topic tags with whitespace and a leading `#` stripped, lowercased and
    /// deduplicated. Empty entries are dropped.
    pub fn normalized_hashtags(&self) -> Vec<String> {
        normalize_tags(&self.hashtags)
    }

    /// Avoid-tags in the same normalized form as [`Self::normalized_hashtags`].
    pub fn normalized_avoid_hashtags(&self) -> Vec<String> {
        normalize_tags(&self.avoid_hashtags)
    }

    pub fn total_daily_quota(&self) -> u32 {
        self.likes_per_day.saturating_add(self.comments_per_day)
    }

    pub fn validate(&self) -> Result<()> {
        if self.normalized_hashtags().is_empty() {
            return Err(CadenceError::Config(
                "at least one hashtag is required".to_string(),
            ));
        }
        if self.total_daily_quota() == 0 {
            return Err(CadenceError::Config(
                "likes_per_day and comments_per_day cannot both be zero".to_string(),
            ));
        }
        if self.per_tag_limit == 0 {
            return Err(CadenceError::Config(
                "per_tag_limit must be positive".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(CadenceError::Config(
                "call_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timing constraints for the pacing scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// First local hour (inclusive) during which actions may happen.
    pub waking_start_hour: u32,
    /// Local hour (exclusive) after which actions stop until the next day.
    pub waking_end_hour: u32,
    /// Longest single sleep between cancellation checks.
    pub max_wait_checkpoint_secs: u64,
}

/// Upper bound on a single uninterrupted wait (15 minutes).
pub const MAX_WAIT_CHECKPOINT_SECS: u64 = 900;

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            waking_start_hour: 8,
            waking_end_hour: 23,
            max_wait_checkpoint_secs: MAX_WAIT_CHECKPOINT_SECS,
        }
    }
}

impl PacingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.waking_start_hour >= self.waking_end_hour || self.waking_end_hour > 24 {
            return Err(CadenceError::Config(format!(
                "invalid waking window [{}, {})",
                self.waking_start_hour, self.waking_end_hour
            )));
        }
        if self.max_wait_checkpoint_secs == 0
            || self.max_wait_checkpoint_secs > MAX_WAIT_CHECKPOINT_SECS
        {
            return Err(CadenceError::Config(format!(
                "max_wait_checkpoint_secs must be in 1..={}, got {}",
                MAX_WAIT_CHECKPOINT_SECS, self.max_wait_checkpoint_secs
            )));
        }
        Ok(())
    }
}
