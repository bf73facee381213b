//! Client configuration.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The API key is only ever read from the
//! environment and is never written back to disk.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "INTELX_API_KEY";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "INTELX_BASE_URL";

/// Environment variable overriding the identity service URL.
pub const IDENTITY_URL_ENV: &str = "INTELX_IDENTITY_URL";

/// Environment variable overriding the minimum spacing between calls.
pub const RATE_LIMIT_ENV: &str = "INTELX_RATE_LIMIT_MS";

/// Minimum spacing between outbound calls, in milliseconds.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Well-known API hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoot {
    /// Paid search API
    Main,
    /// Identity/leak lookup service
    Identity,
    /// Public API tier
    Public,
    /// Free API tier
    Free,
}

impl ApiRoot {
    /// Base URL of the host, without a trailing slash.
    #[must_use]
    pub const fn url(self) -> &'static str {
        match self {
            Self::Main => "https://2.intelx.io",
            Self::Identity => "https://3.intelx.io",
            Self::Public => "https://public.intelx.io",
            Self::Free => "https://free.intelx.io",
        }
    }
}

/// Top-level client configuration.
///
/// Loaded from `~/.config/intelx/config.toml` (or platform equivalent).
/// Missing files and missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection settings
    pub api: ApiConfig,
    /// Search behavior settings
    pub search: SearchConfig,
}

impl ClientConfig {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// when the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration and apply environment overrides.
    ///
    /// Supports `INTELX_API_KEY`, `INTELX_BASE_URL`, `INTELX_IDENTITY_URL`
    /// and `INTELX_RATE_LIMIT_MS`.
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Split out from
    /// [`ClientConfig::load_with_env`] so it can be driven without touching
    /// the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                self.api.api_key = Some(key);
                tracing::debug!("API key taken from {}", API_KEY_ENV);
            }
        }

        if let Some(url) = lookup(BASE_URL_ENV) {
            self.api.base_url = url.trim_end_matches('/').to_string();
            tracing::debug!("Override api.base_url from env: {}", self.api.base_url);
        }

        if let Some(url) = lookup(IDENTITY_URL_ENV) {
            self.api.identity_url = url.trim_end_matches('/').to_string();
            tracing::debug!("Override api.identity_url from env: {}", self.api.identity_url);
        }

        if let Some(val) = lookup(RATE_LIMIT_ENV) {
            self.search.rate_limit_ms = val.parse().map_err(|_| ConfigError::InvalidValue {
                field: RATE_LIMIT_ENV.to_string(),
                reason: format!("expected milliseconds, got '{val}'"),
            })?;
            tracing::debug!(
                "Override search.rate_limit_ms from env: {}",
                self.search.rate_limit_ms
            );
        }

        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "intelx", "intelx").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// API key, or an error when none was configured.
    pub fn api_key(&self) -> ConfigResult<&str> {
        self.api.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the search API
    pub base_url: String,
    /// Base URL of the identity service
    pub identity_url: String,
    /// API key (environment only)
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: ApiRoot::Main.url().to_string(),
            identity_url: ApiRoot::Identity.url().to_string(),
            api_key: None,
            request_timeout_secs: 30,
            user_agent: concat!("intelx-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Search behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum spacing between outbound calls in milliseconds
    pub rate_limit_ms: u64,
    /// Result cap of requests built by the client
    pub default_max_results: u32,
    /// Polling deadline in seconds of requests built by the client
    pub default_timeout_secs: u64,
    /// Entries requested per tree listing page
    pub tree_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            default_max_results: 100,
            default_timeout_secs: 10,
            tree_page_size: 500,
        }
    }
}

impl SearchConfig {
    /// Rate limit spacing as a [`Duration`].
    #[must_use]
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}
