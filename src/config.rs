//! Configuration types for daily-pricing

use crate::store::DEFAULT_CACHE_CAPACITY;
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Pricing store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite file holding bars and corporate actions
    pub path: PathBuf,

    /// Calendar new bar writes are bound to
    #[serde(default = "default_calendar")]
    pub calendar: String,

    /// Reader query cache entries, 0 disables caching
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_calendar() -> String {
    "XNYS".to_string()
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter port, exporter disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
