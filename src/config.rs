//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section carries serde defaults so a missing file or a partial
//! file still yields a runnable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Maximum fetch attempts per provider per cycle.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff unit; doubled after each failed attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Fan out to all providers in parallel, or query them one by one.
    #[serde(default = "default_true")]
    pub concurrent: bool,
    /// Polling interval between collection cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArbitrageConfig {
    /// Minimum absolute price spread in USD/hour.
    #[serde(default = "default_min_price_difference")]
    pub min_price_difference: f64,
    /// Minimum percentage savings relative to the most expensive offer.
    #[serde(default = "default_min_percentage_savings")]
    pub min_percentage_savings: f64,
    /// Minimum distinct providers offering the same GPU.
    #[serde(default = "default_min_providers")]
    pub min_providers: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// -- Defaults ---------------------------------------------------------------

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_interval_secs() -> u64 {
    900
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_min_price_difference() -> f64 {
    0.50
}
fn default_min_percentage_savings() -> f64 {
    10.0
}
fn default_min_providers() -> usize {
    2
}
fn default_api_port() -> u16 {
    8080
}
fn default_database_url() -> String {
    "sqlite:gpu_prices.db?mode=rwc".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            concurrent: true,
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_price_difference: default_min_price_difference(),
            min_percentage_savings: default_min_percentage_savings(),
            min_providers: default_min_providers(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: default_database_url(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load configuration, falling back to built-in defaults when the
    /// file does not exist. A present-but-malformed file is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
