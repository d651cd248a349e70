//! Client configuration
//!
//! Loaded from TOML, with `DQ_BASE_URL` and `DQ_AUTH_TOKEN` taking
//! precedence over the file. Every read model carries its own freshness
//! policy; the defaults are the presets the developer views ship with. A
//! read-model table present in the file replaces its preset, and keys
//! omitted from that table take the generic defaults.

use crate::error::ConfigError;
use dq_query::{QueryOptions, RefetchTriggers};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `base_url`
pub const ENV_BASE_URL: &str = "DQ_BASE_URL";
/// Environment variable overriding `auth_token`
pub const ENV_AUTH_TOKEN: &str = "DQ_AUTH_TOKEN";

/// Freshness policy of one read model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptionsConfig {
    /// Data younger than this is served without a network call
    pub stale_time_secs: u64,
    /// Idle entries are evicted after this long
    pub cache_time_secs: u64,
    /// Refetch stale data when a view subscribes
    pub refetch_on_subscribe: bool,
    /// Refetch stale data when the application regains focus
    pub refetch_on_focus: bool,
    /// Poll while subscribed
    pub refetch_interval_secs: Option<u64>,
}

impl QueryOptionsConfig {
    /// Task list preset: fresh for 30 s
    #[must_use]
    pub fn tasks() -> Self {
        Self {
            stale_time_secs: 30,
            ..Self::default()
        }
    }

    /// Sprint board preset: fresh for 60 s, refetched only by invalidation
    /// or explicit refresh once loaded
    #[must_use]
    pub fn sprint_board() -> Self {
        Self {
            stale_time_secs: 60,
            refetch_on_subscribe: false,
            refetch_on_focus: false,
            ..Self::default()
        }
    }

    /// Dashboard preset: fresh for 30 s
    #[must_use]
    pub fn dashboard() -> Self {
        Self {
            stale_time_secs: 30,
            ..Self::default()
        }
    }

    /// Cache options for the store
    #[must_use]
    pub fn to_options(&self) -> QueryOptions {
        QueryOptions::new()
            .with_stale_time(Duration::from_secs(self.stale_time_secs))
            .with_cache_time(Duration::from_secs(self.cache_time_secs))
            .with_triggers(RefetchTriggers {
                on_subscribe: self.refetch_on_subscribe,
                on_focus: self.refetch_on_focus,
                interval: self
                    .refetch_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            })
    }
}

impl Default for QueryOptionsConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: 0,
            cache_time_secs: 300,
            refetch_on_subscribe: true,
            refetch_on_focus: true,
            refetch_interval_secs: None,
        }
    }
}

/// Configuration of a [`crate::DeveloperClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:4000/api`
    pub base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    /// Tasks per page of the task list
    pub page_size: u32,
    /// Task list freshness
    pub tasks: QueryOptionsConfig,
    /// Sprint board freshness
    pub sprint_board: QueryOptionsConfig,
    /// Dashboard freshness
    pub dashboard: QueryOptionsConfig,
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Parse TOML and validate
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on bad values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    ///
    /// # Errors
    /// `ConfigError::Io` when the file cannot be read, otherwise as
    /// [`ClientConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?.with_env_overrides();
        config.validate()?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "config loaded");
        Ok(config)
    }

    /// Apply `DQ_BASE_URL` / `DQ_AUTH_TOKEN` from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = base_url;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.auth_token = Some(token);
        }
        self
    }

    /// Check values
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api".into(),
            auth_token: None,
            page_size: 10,
            tasks: QueryOptionsConfig::tasks(),
            sprint_board: QueryOptionsConfig::sprint_board(),
            dashboard: QueryOptionsConfig::dashboard(),
        }
    }
}
