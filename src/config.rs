use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Vehicle to track.
    pub bus_id: String,
    /// Base URL of the realtime location feed (fix at `<base>/<bus_id>.json`).
    pub feed_base_url: String,
    /// Base URL of the bus-availability registry.
    pub availability_base_url: String,
    /// Path to the static route catalog file.
    pub catalog_path: String,
    /// IANA timezone the schedule cutover is evaluated in.
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,
    /// Interval in seconds between live tracking ticks (default: 5)
    #[serde(default = "Config::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Interval in seconds between lightweight online/offline checks (default: 10)
    #[serde(default = "Config::default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Stop name the arrival alert fires for, if any.
    #[serde(default)]
    pub user_stop: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    fn default_timezone() -> String {
        "Asia/Kolkata".to_string()
    }
    fn default_poll_interval_secs() -> u64 {
        5
    }
    fn default_status_interval_secs() -> u64 {
        10
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}
