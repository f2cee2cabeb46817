//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use st_core::{
    DEFAULT_MAX_SESSION_MS, DEFAULT_MIN_SESSION_MS, SessionController, SessionPolicy,
    UrlClassifier, ValidationError,
};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

/// Session bounds and housekeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Sessions shorter than this are discarded.
    pub min_session_ms: i64,
    /// Sessions this long or longer are discarded.
    pub max_session_ms: i64,
    /// Interval of the safety-net flush while running.
    pub flush_interval_secs: u64,
    /// Domains not seen for this many days are swept at startup.
    pub retention_days: u32,
    /// Skip localhost and private-network hosts.
    pub ignore_local_hosts: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_session_ms: DEFAULT_MIN_SESSION_MS,
            max_session_ms: DEFAULT_MAX_SESSION_MS,
            flush_interval_secs: 60,
            retention_days: 30,
            ignore_local_hosts: false,
        }
    }
}

impl TrackingConfig {
    pub const fn policy(&self) -> Result<SessionPolicy, ValidationError> {
        SessionPolicy::new(self.min_session_ms, self.max_session_ms)
    }

    /// Builds an idle controller with these bounds.
    pub fn controller(&self) -> Result<SessionController, ValidationError> {
        Ok(SessionController::new(
            UrlClassifier::new(self.ignore_local_hosts),
            self.policy()?,
        ))
    }

    /// Flush interval, never shorter than one second.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}

/// Cloud model settings for `st digest`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// API key; falls back to the key stored by the extension's options page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on the whole model round trip.
    pub timeout_ms: u64,
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: st_llm::DEFAULT_MODEL.to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl AiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("sitetime.db"),
            tracking: TrackingConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, then `config.toml` in the config
    /// directory, then `config_path`, then `ST_*` environment variables
    /// (`ST_TRACKING__MIN_SESSION_MS` sets `tracking.min_session_ms`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("ST_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for sitetime.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sitetime"))
}

/// Returns the platform-specific data directory for sitetime.
///
/// On Linux: `~/.local/share/sitetime`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("sitetime"))
}
