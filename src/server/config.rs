use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::server::change_feed::DEFAULT_FEED_INTERVAL;
use crate::server::monitor_loop::DEFAULT_PROBE_INTERVAL;
use crate::server::prober::{ProbeSettings, DEFAULT_PROBE_TIMEOUT, DEFAULT_SLOW_THRESHOLD};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// PostgreSQL connection string. Without one, checks are kept in memory.
    pub database_url: Option<String>,
    pub log_dir: String,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub probe_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub feed_interval_ms: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    log_dir: Option<String>,
    log_filter: Option<String>,
    probe_timeout_ms: Option<u64>,
    probe_interval_ms: Option<u64>,
    feed_interval_ms: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_filter() -> String {
    "info,sqlx::query=warn".to_string()
}

fn positive(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl PartialServerConfig {
    fn from_file(path_str: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.to_string(),
            source,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<PartialServerConfig>()?)
    }

    #[cfg(test)]
    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, PartialServerConfig>(vars)?)
    }

    /// `self` wins over `lower`.
    fn over(self, lower: PartialServerConfig) -> Self {
        Self {
            listen_addr: self.listen_addr.or(lower.listen_addr),
            database_url: self.database_url.or(lower.database_url),
            log_dir: self.log_dir.or(lower.log_dir),
            log_filter: self.log_filter.or(lower.log_filter),
            probe_timeout_ms: self.probe_timeout_ms.or(lower.probe_timeout_ms),
            probe_interval_ms: self.probe_interval_ms.or(lower.probe_interval_ms),
            feed_interval_ms: self.feed_interval_ms.or(lower.feed_interval_ms),
        }
    }

    fn finish(self) -> Result<ServerConfig, ConfigError> {
        let defaults = ServerConfig::default();
        Ok(ServerConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            database_url: self.database_url.filter(|url| !url.trim().is_empty()),
            log_dir: self.log_dir.unwrap_or(defaults.log_dir),
            log_filter: self
                .log_filter
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            probe_timeout_ms: positive(
                "probe_timeout_ms",
                self.probe_timeout_ms.unwrap_or(defaults.probe_timeout_ms),
            )?,
            probe_interval_ms: positive(
                "probe_interval_ms",
                self.probe_interval_ms.unwrap_or(defaults.probe_interval_ms),
            )?,
            feed_interval_ms: positive(
                "feed_interval_ms",
                self.feed_interval_ms.unwrap_or(defaults.feed_interval_ms),
            )?,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_url: None,
            log_dir: default_log_dir(),
            log_filter: default_log_filter(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL.as_millis() as u64,
            feed_interval_ms: DEFAULT_FEED_INTERVAL.as_millis() as u64,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional TOML file, then the environment (which
    /// wins). A `.env` file is loaded first when present.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialServerConfig::from_file(path)?,
            None => PartialServerConfig::default(),
        };
        let env_config = PartialServerConfig::from_env()?;

        env_config.over(file_config).finish()
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            timeout: Duration::from_millis(self.probe_timeout_ms),
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.database_url, None);
        assert_eq!(config.probe_timeout_ms, 5000);
        assert_eq!(config.probe_interval_ms, 15000);
        assert_eq!(config.feed_interval_ms, 2000);
        assert_eq!(config.log_filter, "info,sqlx::query=warn");
        assert_eq!(config.probe_settings().slow_threshold, Duration::from_millis(1500));
    }

    #[test]
    fn test_file_layer_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "listen_addr = \"127.0.0.1:4000\"\nprobe_interval_ms = 30000\ndatabase_url = \"postgres://u@localhost/db\""
        )
        .unwrap();

        let partial = PartialServerConfig::from_file(file.path().to_str().unwrap()).unwrap();
        let config = partial.finish().unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(config.probe_interval(), Duration::from_secs(30));
        assert_eq!(config.database_url.as_deref(), Some("postgres://u@localhost/db"));
        assert_eq!(config.feed_interval_ms, 2000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let partial = PartialServerConfig::from_file("/definitely/not/here.toml").unwrap();
        assert_eq!(partial.finish().unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "probe_interval_ms = \"soon\"").unwrap();

        let err = PartialServerConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_upper_layer_wins() {
        let file = PartialServerConfig {
            listen_addr: Some("file:1".to_string()),
            log_dir: Some("file-logs".to_string()),
            ..Default::default()
        };
        let env = PartialServerConfig {
            listen_addr: Some("env:2".to_string()),
            ..Default::default()
        };

        let config = env.over(file).finish().unwrap();
        assert_eq!(config.listen_addr, "env:2");
        assert_eq!(config.log_dir, "file-logs");
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_layer_reads_upper_cased_keys() {
        let env = PartialServerConfig::from_vars(vars(&[
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("PROBE_TIMEOUT_MS", "2500"),
            ("LOG_FILTER", "debug"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();
        let file = PartialServerConfig {
            listen_addr: Some("file:1".to_string()),
            probe_interval_ms: Some(30000),
            ..Default::default()
        };

        let config = env.over(file).finish().unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.probe_settings().timeout, Duration::from_millis(2500));
        assert_eq!(config.probe_interval_ms, 30000);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_env_layer_rejects_invalid_numbers() {
        let err = PartialServerConfig::from_vars(vars(&[("FEED_INTERVAL_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let partial = PartialServerConfig {
            feed_interval_ms: Some(0),
            ..Default::default()
        };
        let err = partial.finish().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "feed_interval_ms", .. }));
    }

    #[test]
    fn test_blank_database_url_means_memory_store() {
        let partial = PartialServerConfig {
            database_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(partial.finish().unwrap().database_url, None);
    }
}
