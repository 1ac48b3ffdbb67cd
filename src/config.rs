//! Configuration file parser for `~/.config/feedfold/config.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{SourceDescriptor, DEFAULT_USER_AGENT, MAX_FEED_SIZE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Credentials for a FreshRSS instance exposing the Fever API.
///
/// `api_pass` is the API password set in the FreshRSS profile, not the login
/// password. Debug output masks it.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct FreshRssConfig {
    pub url: String,
    pub user: String,
    pub api_pass: String,
}

impl std::fmt::Debug for FreshRssConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshRssConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("api_pass", &"[REDACTED]")
            .finish()
    }
}

/// Top-level configuration. Any subset of keys may be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of sources fetched at once.
    pub workers: usize,

    /// Applied separately to sending the request and to reading the body.
    /// Zero means the default.
    pub timeout_secs: u64,

    pub user_agent: Option<String>,

    /// Items printed after aggregation. Zero or negative means the default.
    pub limit: i64,

    pub max_body_bytes: usize,

    /// OPML subscription list to read sources from.
    pub opml: Option<PathBuf>,

    /// Accept http(s) source URLs on loopback and private networks.
    pub allow_private_hosts: bool,

    pub freshrss: Option<FreshRssConfig>,

    pub sources: Vec<SourceDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 30,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            limit: Self::DEFAULT_LIMIT as i64,
            max_body_bytes: MAX_FEED_SIZE,
            opml: None,
            allow_private_hosts: false,
            freshrss: None,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    pub const DEFAULT_LIMIT: usize = 25;

    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    const KNOWN_KEYS: [&'static str; 9] = [
        "workers",
        "timeout_secs",
        "user_agent",
        "limit",
        "max_body_bytes",
        "opml",
        "allow_private_hosts",
        "freshrss",
        "sources",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            workers = config.workers,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses config text; blank input gives the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Effective post-aggregation item limit.
    pub fn item_limit(&self) -> usize {
        usize::try_from(self.limit)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(Self::DEFAULT_LIMIT)
    }

    /// Effective per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        let secs = match self.timeout_secs {
            0 => Self::DEFAULT_TIMEOUT_SECS,
            n => n,
        };
        Duration::from_secs(secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }
}
