//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Publisher settings
    #[serde(default)]
    pub publish: PublishConfig,

    /// HTTP status API
    #[serde(default)]
    pub web: WebConfig,

    /// Measurement sources
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Write one JSON line per reading to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            stdout: default_true(),
        }
    }
}

/// HTTP status API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default)]
    pub enable: bool,

    /// Listen address (e.g., "127.0.0.1:8687")
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_listen(),
        }
    }
}

/// All measurement sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// procfs mount point
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// sysfs mount point
    #[serde(default = "default_sys_root")]
    pub sys_root: String,

    #[serde(default)]
    pub cpu_temp: CpuTempConfig,

    #[serde(default)]
    pub cpu_usage: CpuUsageConfig,

    #[serde(default)]
    pub broker_cpu: BrokerCpuConfig,

    #[serde(default)]
    pub mem_available: MemAvailableConfig,

    #[serde(default)]
    pub gps: GpsConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            proc_root: default_proc_root(),
            sys_root: default_sys_root(),
            cpu_temp: CpuTempConfig::default(),
            cpu_usage: CpuUsageConfig::default(),
            broker_cpu: BrokerCpuConfig::default(),
            mem_available: MemAvailableConfig::default(),
            gps: GpsConfig::default(),
        }
    }
}

/// CPU temperature source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuTempConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Polling interval in milliseconds
    #[serde(default = "default_cpu_temp_interval")]
    pub interval_ms: u64,

    /// hwmon name or thermal zone type
    #[serde(default = "default_thermal_sensor")]
    pub sensor: String,
}

impl Default for CpuTempConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            interval_ms: default_cpu_temp_interval(),
            sensor: default_thermal_sensor(),
        }
    }
}

/// System CPU usage source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuUsageConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Polling interval in milliseconds
    #[serde(default = "default_cpu_usage_interval")]
    pub interval_ms: u64,
}

impl Default for CpuUsageConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            interval_ms: default_cpu_usage_interval(),
        }
    }
}

/// Message broker process CPU usage source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerCpuConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Polling interval in milliseconds
    #[serde(default = "default_broker_cpu_interval")]
    pub interval_ms: u64,

    /// PID file of the watched process
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
}

impl Default for BrokerCpuConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            interval_ms: default_broker_cpu_interval(),
            pid_file: default_pid_file(),
        }
    }
}

/// Available memory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemAvailableConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Polling interval in milliseconds
    #[serde(default = "default_mem_available_interval")]
    pub interval_ms: u64,
}

impl Default for MemAvailableConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            interval_ms: default_mem_available_interval(),
        }
    }
}

/// GPS source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Polling interval in milliseconds
    #[serde(default = "default_gps_interval")]
    pub interval_ms: u64,

    /// gpsd address
    #[serde(default = "default_gpsd_address")]
    pub address: String,

    /// Longest a single sample waits for a gpsd report
    #[serde(default = "default_gps_read_timeout")]
    pub read_timeout_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            interval_ms: default_gps_interval(),
            address: default_gpsd_address(),
            read_timeout_ms: default_gps_read_timeout(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1:8687".to_string()
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_sys_root() -> String {
    "/sys".to_string()
}

fn default_cpu_temp_interval() -> u64 {
    2000
}

fn default_thermal_sensor() -> String {
    "cpu_thermal".to_string()
}

fn default_cpu_usage_interval() -> u64 {
    50
}

fn default_broker_cpu_interval() -> u64 {
    100
}

fn default_pid_file() -> String {
    "/var/run/mosquitto.pid".to_string()
}

fn default_mem_available_interval() -> u64 {
    500
}

fn default_gps_interval() -> u64 {
    100
}

fn default_gpsd_address() -> String {
    "127.0.0.1:2947".to_string()
}

fn default_gps_read_timeout() -> u64 {
    1000
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }
}
