//! Configuration data model and validation

use crate::types::{AppError, MeasurementKind, Result, Target, TargetSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Addresses for latency (ping) measurements
    #[serde(default = "default_ping_addresses")]
    pub ping_addresses: Vec<String>,

    /// Seconds between the end of one ping round and the start of the next
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Echo requests sent per address per round
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Per-target timeout for a ping probe
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    /// Speed-test server ids for throughput measurements
    #[serde(default)]
    pub speed_server_ids: Vec<String>,

    /// Seconds between the end of one speed round and the start of the next
    #[serde(default = "default_speed_interval_secs")]
    pub speed_interval_secs: u64,

    /// Per-target timeout for a speed test
    #[serde(default = "default_speed_timeout_secs")]
    pub speed_timeout_secs: u64,

    /// Port the HTTP trigger surface listens on
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Deadline for an on-demand invocation from an HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight rounds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Base URL of the netmon server, used by the CLI client
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Minimum log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping_addresses: default_ping_addresses(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_count: default_ping_count(),
            ping_timeout_secs: default_ping_timeout_secs(),
            speed_server_ids: Vec::new(),
            speed_interval_secs: default_speed_interval_secs(),
            speed_timeout_secs: default_speed_timeout_secs(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            server_url: default_server_url(),
            log_level: default_log_level(),
            log_json: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn speed_interval(&self) -> Duration {
        Duration::from_secs(self.speed_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn speed_timeout(&self) -> Duration {
        Duration::from_secs(self.speed_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.ping_addresses.is_empty() {
            return Err(AppError::config("At least one ping address is required"));
        }

        for address in &self.ping_addresses {
            if address.trim().is_empty() {
                return Err(AppError::config("Ping address cannot be empty"));
            }
            Target::check_id(MeasurementKind::Latency, address.trim()).map_err(AppError::config)?;
        }

        for server_id in &self.speed_server_ids {
            if server_id.trim().is_empty() {
                return Err(AppError::config("Speed test server id cannot be empty"));
            }
            Target::check_id(MeasurementKind::Throughput, server_id.trim()).map_err(AppError::config)?;
        }

        if self.ping_interval_secs == 0 {
            return Err(AppError::config("Ping interval must be greater than 0"));
        }

        if self.speed_interval_secs == 0 {
            return Err(AppError::config("Speed test interval must be greater than 0"));
        }

        if self.ping_count == 0 || self.ping_count > 100 {
            return Err(AppError::config(format!("Ping count must be between 1 and 100, got: {}", self.ping_count)));
        }

        if self.ping_timeout_secs == 0 {
            return Err(AppError::config("Ping timeout must be greater than 0"));
        }

        if self.speed_timeout_secs == 0 {
            return Err(AppError::config("Speed test timeout must be greater than 0"));
        }

        if self.request_timeout_secs == 0 {
            return Err(AppError::config("Request timeout must be greater than 0"));
        }

        if self.http_port == 0 {
            return Err(AppError::config("HTTP port must be greater than 0"));
        }

        match url::Url::parse(&self.server_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                return Err(AppError::config(format!("Server URL must use http or https, got: {}", parsed.scheme())));
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid server URL '{}': {}", self.server_url, e)));
            }
        }

        if self.log_level.parse::<crate::logging::LogLevel>().is_err() {
            return Err(AppError::config(format!("Invalid log level: {}", self.log_level)));
        }

        Ok(())
    }

    /// Additional checks for running the daemon, which schedules both kinds
    pub fn validate_for_daemon(&self) -> Result<()> {
        self.validate()?;

        if self.speed_server_ids.is_empty() {
            return Err(AppError::config("NETMON_SPEED_SERVER_IDS must list at least one speed test server id"));
        }

        Ok(())
    }

    /// Build the immutable target set from the configured lists
    pub fn target_set(&self) -> Result<TargetSet> {
        TargetSet::new(&self.ping_addresses, &self.speed_server_ids)
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(addresses) = std::env::var("NETMON_PING_ADDRESSES") {
            self.ping_addresses = split_list(&addresses);
        }

        if let Ok(server_ids) = std::env::var("NETMON_SPEED_SERVER_IDS") {
            self.speed_server_ids = split_list(&server_ids);
        }

        if let Some(value) = env_parse("NETMON_PING_INTERVAL_SECONDS")? {
            self.ping_interval_secs = value;
        }

        if let Some(value) = env_parse("NETMON_PING_COUNT")? {
            self.ping_count = value;
        }

        if let Some(value) = env_parse("NETMON_PING_TIMEOUT_SECONDS")? {
            self.ping_timeout_secs = value;
        }

        if let Some(value) = env_parse("NETMON_SPEED_INTERVAL_SECONDS")? {
            self.speed_interval_secs = value;
        }

        if let Some(value) = env_parse("NETMON_SPEED_TIMEOUT_SECONDS")? {
            self.speed_timeout_secs = value;
        }

        if let Some(value) = env_parse("NETMON_HTTP_PORT")? {
            self.http_port = value;
        }

        if let Some(value) = env_parse("NETMON_REQUEST_TIMEOUT_SECONDS")? {
            self.request_timeout_secs = value;
        }

        if let Some(value) = env_parse("NETMON_SHUTDOWN_GRACE_SECONDS")? {
            self.shutdown_grace_secs = value;
        }

        if let Ok(url) = std::env::var("NETMON_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }

        if let Ok(level) = std::env::var("NETMON_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.log_level = level.trim().to_string();
            }
        }

        if let Some(value) = env_parse("NETMON_LOG_JSON")? {
            self.log_json = value;
        }

        if let Some(value) = env_parse("NETMON_ENABLE_COLOR")? {
            self.enable_color = value;
        }

        Ok(())
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e))),
        _ => Ok(None),
    }
}

// Default value functions for serde
fn default_ping_addresses() -> Vec<String> {
    crate::defaults::DEFAULT_PING_ADDRESSES
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_ping_interval_secs() -> u64 {
    crate::defaults::DEFAULT_PING_INTERVAL.as_secs()
}

fn default_ping_count() -> u32 {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_ping_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_PING_TIMEOUT.as_secs()
}

fn default_speed_interval_secs() -> u64 {
    crate::defaults::DEFAULT_SPEED_INTERVAL.as_secs()
}

fn default_speed_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_SPEED_TIMEOUT.as_secs()
}

fn default_http_port() -> u16 {
    crate::defaults::DEFAULT_HTTP_PORT
}

fn default_request_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_shutdown_grace_secs() -> u64 {
    crate::defaults::DEFAULT_SHUTDOWN_GRACE.as_secs()
}

fn default_server_url() -> String {
    crate::defaults::DEFAULT_SERVER_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
