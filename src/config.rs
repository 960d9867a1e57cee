//! Configuration management
//!
//! Handles loading and validating tracker configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::health::MAX_WINDOW;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Project label attached to every telemetry series
    pub project_id: String,
    /// Seconds between counter resets
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Significant figures kept by the latency histograms (0-5)
    #[serde(default = "default_quantile_precision")]
    pub quantile_precision: u8,
}

impl TrackerConfig {
    /// Reset window as a duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics endpoint
    #[serde(default)]
    pub enabled: bool,
    /// Metrics server bind address
    #[serde(default = "default_metrics_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_metrics_addr(),
        }
    }
}

/// Snapshot API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Enable the JSON snapshot endpoint
    #[serde(default)]
    pub enabled: bool,
    /// API server bind address
    #[serde(default = "default_api_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_api_addr(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_window_secs() -> u64 { 30 }
fn default_quantile_precision() -> u8 { 3 }
fn default_metrics_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9090)) }
fn default_api_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9091)) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.tracker.project_id.is_empty() {
            anyhow::bail!("tracker.project_id must not be empty");
        }
        if self.tracker.window_secs == 0 {
            anyhow::bail!("tracker.window_secs must be > 0");
        }
        if self.tracker.window_secs > MAX_WINDOW.as_secs() {
            anyhow::bail!(
                "tracker.window_secs must be <= {}",
                MAX_WINDOW.as_secs()
            );
        }
        if self.tracker.quantile_precision > 5 {
            anyhow::bail!("tracker.quantile_precision must be <= 5");
        }
        if self.api.enabled
            && self.metrics.enabled
            && self.api.bind_addr == self.metrics.bind_addr
        {
            anyhow::bail!("api.bind_addr and metrics.bind_addr must differ");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml(
            r#"
            [tracker]
            project_id = "main"
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.window(), Duration::from_secs(30));
        assert_eq!(config.tracker.quantile_precision, 3);
        assert!(!config.metrics.enabled);
        assert!(!config.api.enabled);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [tracker]
            project_id = "frontend"
            window_secs = 120
            quantile_precision = 2

            [metrics]
            enabled = true
            bind_addr = "0.0.0.0:4001"

            [api]
            enabled = true
            bind_addr = "0.0.0.0:4002"

            [logging]
            level = "debug"
            format = "pretty"
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.project_id, "frontend");
        assert_eq!(config.tracker.window(), Duration::from_secs(120));
        assert_eq!(config.metrics.bind_addr.port(), 4001);
        assert_eq!(config.api.bind_addr.port(), 4002);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = Config::from_toml(
            r#"
            [tracker]
            project_id = "main"
            window_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("window_secs"));
    }

    #[test]
    fn test_rejects_oversized_window() {
        let err = Config::from_toml(
            r#"
            [tracker]
            project_id = "main"
            window_secs = 9223372036854775807
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("window_secs"));

        let week = format!(
            "[tracker]\nproject_id = \"main\"\nwindow_secs = {}\n",
            MAX_WINDOW.as_secs()
        );
        assert!(Config::from_toml(&week).is_ok());
    }

    #[test]
    fn test_rejects_bad_precision() {
        let result = Config::from_toml(
            r#"
            [tracker]
            project_id = "main"
            quantile_precision = 7
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_missing_tracker() {
        assert!(Config::from_toml("[logging]\nlevel = \"info\"\n").is_err());
    }
}
