//! Application configuration management.
//!
//! Configuration is stored at `~/.config/covidcache/config.json`. Every
//! field is optional; environment variables (also read from `.env`)
//! override the file:
//!
//! - `COVIDCACHE_API_ENDPOINT`
//! - `COVIDCACHE_CACHE_TTL_HOURS`

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{normalize_endpoint, DEFAULT_API_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::service::DEFAULT_CACHE_TTL_HOURS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "covidcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_ENDPOINT: &str = "COVIDCACHE_API_ENDPOINT";
const ENV_CACHE_TTL_HOURS: &str = "COVIDCACHE_CACHE_TTL_HOURS";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_endpoint: Option<String>,
    pub cache_ttl_hours: Option<f64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(ENV_API_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.api_endpoint = Some(endpoint);
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_HOURS) {
            match raw.trim().parse::<f64>() {
                Ok(hours) => self.cache_ttl_hours = Some(hours),
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_CACHE_TTL_HOURS),
            }
        }
    }

    pub fn api_endpoint(&self) -> String {
        normalize_endpoint(self.api_endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT))
    }

    pub fn cache_ttl_hours(&self) -> f64 {
        self.cache_ttl_hours.unwrap_or(DEFAULT_CACHE_TTL_HOURS)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
