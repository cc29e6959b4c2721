//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `STOREFRONT_API_URL` overrides `api.base_url` so one config file can be
//! pointed at different backends.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub session: SessionConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Backend origin; `/api/v1` is appended
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Catalog forwarder settings
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Forwarder origin; defaults to the backend origin
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Session persistence and refresh timing
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    pub state_dir: PathBuf,
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_secs: u64,
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    catalog::DEFAULT_TTL.as_secs()
}

fn default_refresh_buffer() -> u64 {
    storefront_auth::REFRESH_BUFFER.as_secs()
}

fn default_check_interval() -> u64 {
    storefront_auth::SESSION_CHECK_INTERVAL.as_secs()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("STOREFRONT_API_URL") {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        check_url("api.base_url", &self.api.base_url)?;
        if let Some(url) = &self.catalog.base_url {
            check_url("catalog.base_url", url)?;
        }

        let durations = [
            ("api.timeout_secs", self.api.timeout_secs),
            ("catalog.cache_ttl_secs", self.catalog.cache_ttl_secs),
            ("session.check_interval_secs", self.session.check_interval_secs),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("storefront.toml")
    }

    pub fn catalog_url(&self) -> &str {
        self.catalog.base_url.as_deref().unwrap_or(&self.api.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog.cache_ttl_secs)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.session.refresh_buffer_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.session.check_interval_secs)
    }
}

fn check_url(name: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )))
    }
}
