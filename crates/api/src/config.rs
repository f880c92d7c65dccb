//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use workflow::ConfigError;
use workflow::config::parse_var;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `SHUTDOWN_TIMEOUT_SECONDS`: grace period for background tasks (default: `30`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_var(&lookup, "LOG_FORMAT", defaults.log_format)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_var(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            shutdown_timeout: Duration::from_secs(parse_var(
                &lookup,
                "SHUTDOWN_TIMEOUT_SECONDS",
                defaults.shutdown_timeout.as_secs(),
            )?),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}
