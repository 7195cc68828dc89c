use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::resilience::{self, ResilienceSettings};

pub const APP_DIR: &str = "sharepoint-connect";
pub const DEFAULT_KEYRING_SERVICE: &str = "sharepoint-connect";
pub const KEYRING_SERVICE_ENV: &str = "SPCONNECT_KEYRING_SERVICE";
pub const TOKEN_CACHE_ENV: &str = "SPCONNECT_TOKEN_CACHE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResilienceDefaults {
    #[serde(default = "default_health_score")]
    pub minimal_health_score: i32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_wait_secs")]
    pub retry_wait_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_health_score() -> i32 {
    resilience::NO_HEALTH_CHECK
}

fn default_retry_count() -> u32 {
    resilience::DEFAULT_RETRY_COUNT
}

fn default_retry_wait_secs() -> u64 {
    resilience::DEFAULT_RETRY_WAIT.as_secs()
}

fn default_request_timeout_ms() -> u64 {
    resilience::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

impl Default for ResilienceDefaults {
    fn default() -> Self {
        Self {
            minimal_health_score: default_health_score(),
            retry_count: default_retry_count(),
            retry_wait_secs: default_retry_wait_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ResilienceDefaults {
    pub fn to_settings(&self) -> ResilienceSettings {
        ResilienceSettings::builder()
            .minimal_health_score(self.minimal_health_score)
            .retry_count(self.retry_count)
            .retry_wait(Duration::from_secs(self.retry_wait_secs))
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub keyring_service: Option<String>,
    #[serde(default)]
    pub token_cache_path: Option<PathBuf>,
    #[serde(default)]
    pub resilience: ResilienceDefaults,
}

impl Config {
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join(APP_DIR)
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(format!(".{}", APP_DIR))
        };

        Ok(config_dir)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Load `.env`, the config file and environment overrides
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Self::get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(service) = lookup(KEYRING_SERVICE_ENV).filter(|s| !s.is_empty()) {
            debug!("Keyring service overridden by {}", KEYRING_SERVICE_ENV);
            self.keyring_service = Some(service);
        }
        if let Some(path) = lookup(TOKEN_CACHE_ENV).filter(|s| !s.is_empty()) {
            debug!("Token cache path overridden by {}", TOKEN_CACHE_ENV);
            self.token_cache_path = Some(PathBuf::from(path));
        }
    }

    pub fn keyring_service(&self) -> &str {
        self.keyring_service.as_deref().unwrap_or(DEFAULT_KEYRING_SERVICE)
    }

    pub fn token_cache_path(&self) -> Result<PathBuf> {
        match &self.token_cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::get_config_dir()?.join("token_cache.json")),
        }
    }
}
