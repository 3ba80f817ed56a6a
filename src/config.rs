use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::stream::ConsumerConfig;

/// Application-level constants
pub const APP_NAME: &str = "Incident Summariser";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const ENV_BACKEND_URL: &str = "INCIDENT_BACKEND_URL";
pub const ENV_STALL_TIMEOUT_SECS: &str = "INCIDENT_STALL_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "INCIDENT_CONNECT_TIMEOUT_SECS";
pub const ENV_API_ADDR: &str = "INCIDENT_API_ADDR";
pub const ENV_EXPORT_DIR: &str = "INCIDENT_EXPORT_DIR";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "incident_summariser=info,tower_http=info"
}

/// Default export directory: ~/IncidentReports/
pub fn default_export_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("IncidentReports")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Runtime settings, from the environment with CLI flags layered on top.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend_url: String,
    pub stall_timeout: Duration,
    pub connect_timeout: Duration,
    pub api_addr: SocketAddr,
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            export_dir: default_export_dir(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_BACKEND_URL) {
            config.backend_url = parse_backend_url(ENV_BACKEND_URL, &url)?;
        }
        if let Some(secs) = get(ENV_STALL_TIMEOUT_SECS) {
            config.stall_timeout = parse_secs(ENV_STALL_TIMEOUT_SECS, &secs)?;
        }
        if let Some(secs) = get(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout = parse_secs(ENV_CONNECT_TIMEOUT_SECS, &secs)?;
        }
        if let Some(addr) = get(ENV_API_ADDR) {
            config.api_addr = addr.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_API_ADDR,
                value: addr.clone(),
                reason: "expected host:port",
            })?;
        }
        if let Some(dir) = get(ENV_EXPORT_DIR) {
            config.export_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn with_backend_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.backend_url = parse_backend_url("--backend-url", url)?;
        Ok(self)
    }

    pub fn with_stall_timeout_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::Invalid {
                key: "--stall-timeout-secs",
                value: secs.to_string(),
                reason: "must be at least 1",
            });
        }
        self.stall_timeout = Duration::from_secs(secs);
        Ok(self)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            stall_timeout: self.stall_timeout,
        }
    }
}

fn parse_backend_url(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected an http:// or https:// URL",
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a positive number of seconds",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.stall_timeout, Duration::from_secs(60));
        assert_eq!(config.api_addr.to_string(), DEFAULT_API_ADDR);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_BACKEND_URL, "https://reports.internal:8443/"),
            (ENV_STALL_TIMEOUT_SECS, "120"),
            (ENV_CONNECT_TIMEOUT_SECS, "3"),
            (ENV_API_ADDR, "0.0.0.0:9000"),
            (ENV_EXPORT_DIR, "/tmp/reports"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "https://reports.internal:8443");
        assert_eq!(config.stall_timeout, Duration::from_secs(120));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.api_addr.port(), 9000);
        assert_eq!(config.export_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn blank_values_ignored() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_BACKEND_URL, "  ")])).unwrap();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[(ENV_STALL_TIMEOUT_SECS, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_STALL_TIMEOUT_SECS, "soon")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_API_ADDR, "localhost")])).is_err());
        let err = AppConfig::from_lookup(lookup(&[(ENV_BACKEND_URL, "ftp://x")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BACKEND_URL));
    }

    #[test]
    fn flag_overrides_validate() {
        let config = AppConfig::default()
            .with_backend_url("http://gen:5000/")
            .unwrap()
            .with_stall_timeout_secs(5)
            .unwrap();
        assert_eq!(config.backend_url, "http://gen:5000");
        assert_eq!(config.consumer_config().stall_timeout, Duration::from_secs(5));
        assert!(AppConfig::default().with_stall_timeout_secs(0).is_err());
    }

    #[test]
    fn export_dir_under_home() {
        let dir = default_export_dir();
        assert!(dir.ends_with("IncidentReports"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
