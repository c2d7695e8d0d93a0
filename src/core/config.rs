use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.exchangeratesapi.io";
pub const BASE_URL_ENV: &str = "FX_API_BASE_URL";
pub const ACCESS_KEY_ENV: &str = "FX_API_ACCESS_KEY";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window. Zero disables limiting.
    pub calls: usize,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            calls: 20,
            period_secs: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn disabled() -> Self {
        RateLimitConfig {
            calls: 0,
            period_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub access_key: Option<String>,
    pub timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_key: None,
            timeout_secs: 10,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        ProviderConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FxConfig {
    pub provider: ProviderConfig,
    /// Decimal places kept in converted amounts.
    pub precision: u32,
}

impl Default for FxConfig {
    fn default() -> Self {
        FxConfig {
            provider: ProviderConfig::default(),
            precision: 2,
        }
    }
}

impl FxConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file exists there.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fx-api", "fx-api")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Applies the provider base URL and access key from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            debug!("Overriding base_url from {BASE_URL_ENV}");
            self.provider.base_url = base_url;
        }
        if let Some(key) = lookup(ACCESS_KEY_ENV).filter(|v| !v.is_empty()) {
            self.provider.access_key = Some(key);
        }
        self
    }
}
