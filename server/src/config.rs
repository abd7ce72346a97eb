//! Configuration management for the server.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tci_live_engine::resource::validate_identifier;

use crate::live::LiveOptions;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL of the data service
    pub database_url: String,
    /// Connection pool size
    pub max_connections: u32,
    /// Channel the change trigger notifies on
    pub notify_channel: String,
    /// Upper bound for one snapshot fetch
    pub fetch_timeout: Duration,
    /// Wait before resubscribing after a lost subscription
    pub resubscribe_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse(&lookup, "PORT", 3000)?;
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;
        let max_connections = parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let notify_channel = lookup("NOTIFY_CHANNEL").unwrap_or_else(|| "tci_changes".to_string());
        validate_identifier(&notify_channel)
            .map_err(|_| ConfigError::InvalidChannel(notify_channel.clone()))?;

        let fetch_timeout = Duration::from_secs(parse(&lookup, "FETCH_TIMEOUT_SECS", 10)?);
        let resubscribe_delay = Duration::from_millis(parse(&lookup, "RESUBSCRIBE_DELAY_MS", 500)?);

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            notify_channel,
            fetch_timeout,
            resubscribe_delay,
        })
    }

    /// Timing options for live collections.
    pub fn live_options(&self) -> LiveOptions {
        LiveOptions {
            fetch_timeout: self.fetch_timeout,
            resubscribe_delay: self.resubscribe_delay,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid {var} value: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid NOTIFY_CHANNEL: {0:?}")]
    InvalidChannel(String),
}
