//! Environment-driven service configuration.
//!
//! Required keys: `IFTTT_SERVICE_KEY`, `GOOGLE_MAPS_KEY`. Everything else
//! has a default so a bare deployment only needs the two secrets.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sweep::DEFAULT_SWEEP_INTERVAL;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_REALTIME_URL: &str = "https://realtime.ifttt.com/v1/notifications";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub bind: String,
    /// Shared secret for inbound requests and outbound realtime signals.
    pub ifttt_service_key: String,
    /// Google Directions API key.
    pub google_maps_key: String,
    /// Batched realtime notification endpoint.
    pub realtime_url: String,
    pub sweep_interval: Duration,
    /// SQLite file; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind: var_or("COMMUTEWATCH_BIND", DEFAULT_BIND),
            ifttt_service_key: required_var("IFTTT_SERVICE_KEY")?,
            google_maps_key: required_var("GOOGLE_MAPS_KEY")?,
            realtime_url: var_or("IFTTT_REALTIME_URL", DEFAULT_REALTIME_URL),
            sweep_interval: sweep_interval_from_env()?,
            database_path: std::env::var("COMMUTEWATCH_DB")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn required_var(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingKey(key.to_string())),
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn sweep_interval_from_env() -> Result<Duration, ConfigError> {
    match std::env::var("COMMUTEWATCH_SWEEP_INTERVAL_SECS") {
        Err(_) => Ok(DEFAULT_SWEEP_INTERVAL),
        Ok(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "COMMUTEWATCH_SWEEP_INTERVAL_SECS".to_string(),
                message: format!("'{raw}' is not a whole number of seconds"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "COMMUTEWATCH_SWEEP_INTERVAL_SECS".to_string(),
                    message: "interval must be at least 1 second".to_string(),
                });
            }
            Ok(Duration::from_secs(secs))
        }
    }
}
