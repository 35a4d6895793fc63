//! Feed client configuration.
//!
//! Stored as camelCase JSON. Every field has a default, so an empty object
//! (or no file at all) yields a working configuration.

use crate::DEFAULT_RELAYS;
use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::session::{CONTENT_QUERY_TIMEOUT, PROFILE_QUERY_TIMEOUT, parse_relay_url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Feed client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    /// Relays queried on every fetch, in priority order
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,

    /// Session deadline for post queries
    #[serde(default = "default_content_timeout")]
    pub content_timeout_secs: u64,

    /// Session deadline for profile queries
    #[serde(default = "default_profile_timeout")]
    pub profile_timeout_secs: u64,

    /// How long a post list stays cached
    #[serde(default = "default_posts_ttl")]
    pub posts_ttl_secs: u64,

    /// How long a profile stays cached
    #[serde(default = "default_profile_ttl")]
    pub profile_ttl_secs: u64,

    /// `limit` sent with post queries
    #[serde(default = "default_post_limit")]
    pub post_limit: u32,

    /// Upper bound on entries held by the in-memory cache
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            content_timeout_secs: default_content_timeout(),
            profile_timeout_secs: default_profile_timeout(),
            posts_ttl_secs: default_posts_ttl(),
            profile_ttl_secs: default_profile_ttl(),
            post_limit: default_post_limit(),
            cache_max_entries: default_cache_max_entries(),
        }
    }
}

impl FeedConfig {
    /// Default configuration with a custom relay list.
    pub fn with_relays(relays: Vec<String>) -> Self {
        Self {
            relays,
            ..Self::default()
        }
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }

    pub fn posts_ttl(&self) -> Duration {
        Duration::from_secs(self.posts_ttl_secs)
    }

    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_secs)
    }

    /// Reject configurations that could never produce results.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::Invalid("relay list is empty".to_string()));
        }
        for relay in &self.relays {
            parse_relay_url(relay).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self.content_timeout_secs == 0 || self.profile_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "query timeouts must be at least one second".to_string(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cacheMaxEntries must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FeedConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: FeedConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file, falling back to defaults when it does not exist.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<FeedConfig, ConfigError> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        Ok(FeedConfig::default())
    }
}

fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|url| url.to_string()).collect()
}

fn default_content_timeout() -> u64 {
    CONTENT_QUERY_TIMEOUT.as_secs()
}

fn default_profile_timeout() -> u64 {
    PROFILE_QUERY_TIMEOUT.as_secs()
}

fn default_posts_ttl() -> u64 {
    300
}

fn default_profile_ttl() -> u64 {
    3600
}

fn default_post_limit() -> u32 {
    100
}

fn default_cache_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}
