// src/config.rs

//! Manages proxy configuration: loading, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Configuration for the single upstream origin.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OriginConfig {
    /// Fully-qualified base URL of the origin. Must end with `/` so request
    /// paths join onto it cleanly.
    pub url: Url,
    /// Per-request timeout for origin fetches. A timed-out fetch is treated
    /// as a transport failure.
    #[serde(default = "default_origin_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Status codes whose responses may be stored.
    #[serde(default = "default_cacheable_status_codes")]
    pub cacheable_status_codes: HashSet<u16>,
}

fn default_origin_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_cacheable_status_codes() -> HashSet<u16> {
    HashSet::from([200])
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://127.0.0.1:8080/").expect("default origin URL is valid"),
            timeout: default_origin_timeout(),
            cacheable_status_codes: default_cacheable_status_codes(),
        }
    }
}

/// Configuration for cache freshness and eviction.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// Freshness lifetime applied when a response carries no usable
    /// `Cache-Control` or `Expires`/`Date` information.
    #[serde(default = "default_default_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,
    /// How often the sweeper task scans for long-stale entities.
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Entities stale for longer than this are evicted by the sweeper.
    /// Within the grace they stay revalidatable.
    #[serde(default = "default_sweep_grace", with = "humantime_serde")]
    pub sweep_grace: Duration,
}

fn default_default_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60) // 7 days
}
fn default_sweep_interval() -> Duration {
    Duration::from_secs(300)
}
fn default_sweep_grace() -> Duration {
    Duration::from_secs(3600)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_default_ttl(),
            sweep_interval: default_sweep_interval(),
            sweep_grace: default_sweep_grace(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_save_interval", with = "humantime_serde")]
    pub save_interval: Duration,
}

fn default_snapshot_path() -> String {
    "pullcdn.snapshot".to_string()
}
fn default_save_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            snapshot_path: default_snapshot_path(),
            save_interval: default_save_interval(),
        }
    }
}

/// Configuration for the JSON stats endpoint.
///
/// The proxy surface accepts any path, so stats are served from their own
/// listener port instead of shadowing a proxied path.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StatsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_stats_port")]
    pub port: u16,
}

fn default_stats_port() -> u16 {
    8701
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_stats_port(),
        }
    }
}

/// Represents the final, validated proxy configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub origin: OriginConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8700
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            origin: OriginConfig::default(),
            cache: CacheConfig::default(),
            persistence: PersistenceConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }

        let url = &self.origin.url;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "origin.url must use the http or https scheme, got '{}'",
                url.scheme()
            ));
        }
        if !url.as_str().ends_with('/') {
            return Err(anyhow!(
                "origin.url must end with a trailing slash, got '{url}'"
            ));
        }
        if self.origin.timeout.is_zero() {
            return Err(anyhow!("origin.timeout cannot be 0"));
        }
        if self.origin.cacheable_status_codes.is_empty() {
            return Err(anyhow!("origin.cacheable_status_codes cannot be empty"));
        }

        if self.cache.default_ttl.is_zero() {
            warn!(
                "cache.default_ttl is 0. Responses without freshness headers will be stale immediately."
            );
        }
        if self.cache.sweep_interval.is_zero() {
            return Err(anyhow!("cache.sweep_interval cannot be 0"));
        }

        if self.persistence.enabled {
            if self.persistence.snapshot_path.trim().is_empty() {
                return Err(anyhow!(
                    "persistence.snapshot_path cannot be empty when persistence is enabled"
                ));
            }
            if self.persistence.save_interval.is_zero() {
                return Err(anyhow!("persistence.save_interval cannot be 0"));
            }
        }

        if self.stats.enabled {
            if self.stats.port == 0 {
                return Err(anyhow!("stats.port cannot be 0"));
            }
            if self.stats.port == self.port {
                return Err(anyhow!(
                    "stats.port cannot be the same as the main proxy port"
                ));
            }
        }
        Ok(())
    }
}
