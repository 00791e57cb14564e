//! Configuration types for tickfeed

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Tick loop and random-walk configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TickConfig {
    /// Interval between ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,

    /// Maximum per-tick price move in basis points
    #[serde(default = "default_max_delta_bps")]
    pub max_delta_bps: u32,

    /// Minimum positive price; candidates below are floored here
    #[serde(default = "default_min_price")]
    pub min_price: Decimal,

    /// Decimal places prices are rounded to
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    /// Upper bound of the per-tick volume increment
    #[serde(default = "default_max_volume_step")]
    pub max_volume_step: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_max_delta_bps() -> u32 {
    200
}
fn default_min_price() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_price_decimals() -> u32 {
    2
}
fn default_max_volume_step() -> u64 {
    10_000
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
            max_delta_bps: default_max_delta_bps(),
            min_price: default_min_price(),
            price_decimals: default_price_decimals(),
            max_volume_step: default_max_volume_step(),
        }
    }
}

/// Write-behind persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Seconds between flush cycles
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Seconds before an in-flight flush is treated as failed
    #[serde(default = "default_flush_timeout_secs")]
    pub flush_timeout_secs: u64,

    /// Pending history cap; oldest points are evicted beyond this
    #[serde(default = "default_max_pending_history")]
    pub max_pending_history: usize,

    /// Data directory for the file-backed store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_flush_interval_secs() -> u64 {
    60
}
fn default_flush_timeout_secs() -> u64 {
    10
}
fn default_max_pending_history() -> usize {
    50_000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            flush_timeout_secs: default_flush_timeout_secs(),
            max_pending_history: default_max_pending_history(),
            data_dir: default_data_dir(),
        }
    }
}

/// Bootstrap and reconcile configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Seconds between periodic registry reloads from the store
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

fn default_reload_interval_secs() -> u64 {
    300
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: default_reload_interval_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Port for the Prometheus exporter; disabled when unset
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [tick]
            interval_ms = 500
            max_delta_bps = 150
            min_price = 0.05
            price_decimals = 2
            max_volume_step = 5000

            [persistence]
            flush_interval_secs = 30
            flush_timeout_secs = 5
            max_pending_history = 20000
            data_dir = "./quotes"

            [bootstrap]
            reload_interval_secs = 600

            [telemetry]
            log_level = "debug"
            metrics_port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tick.interval_ms, 500);
        assert_eq!(config.tick.min_price, dec!(0.05));
        assert_eq!(config.persistence.flush_interval_secs, 30);
        assert_eq!(config.bootstrap.reload_interval_secs, 600);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.tick.interval_ms, 1000);
        assert_eq!(config.tick.max_delta_bps, 200);
        assert_eq!(config.tick.min_price, dec!(0.01));
        assert_eq!(config.persistence.flush_interval_secs, 60);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.metrics_port.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
            [tick]
            interval_ms = 250
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tick.interval_ms, 250);
        assert_eq!(config.tick.max_delta_bps, 200);
        assert_eq!(config.persistence.max_pending_history, 50_000);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
