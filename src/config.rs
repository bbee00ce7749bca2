//! Server configuration
//!
//! Defaults suit local development. The bind address comes from the
//! first command-line argument, then `RELAY_ADDR`, then `PORT`.
//! Buffer sizes and the persistence timeout can be tuned with
//! `RELAY_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Channel buffer size for hub commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Per-connection outbound buffer
pub const DEFAULT_CLIENT_BUFFER: usize = 32;

/// Pending directory writes before updates are dropped
pub const DEFAULT_PERSIST_QUEUE: usize = 1024;

/// Upper bound on a single directory write
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime settings for the relay
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the WebSocket listener binds to
    pub bind_addr: String,
    /// Hub command queue capacity
    pub command_buffer: usize,
    /// Outbound queue capacity per connection
    pub client_buffer: usize,
    /// Pending directory writes before updates are dropped
    pub persist_queue: usize,
    /// Timeout applied to each directory write
    pub persist_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            persist_queue: DEFAULT_PERSIST_QUEUE,
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
        }
    }
}

impl Config {
    /// Build from the process arguments and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(std::env::args().nth(1), |key| std::env::var(key).ok())
    }

    /// Build from an explicit address argument and variable lookup
    pub fn from_lookup<F>(addr_arg: Option<String>, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = addr_arg.or_else(|| var("RELAY_ADDR")) {
            config.bind_addr = addr;
        } else if let Some(port) = var("PORT") {
            let port: u16 = parse("PORT", port)?;
            config.bind_addr = format!("0.0.0.0:{}", port);
        }

        if let Some(value) = var("RELAY_COMMAND_BUFFER") {
            config.command_buffer = parse_capacity("RELAY_COMMAND_BUFFER", value)?;
        }
        if let Some(value) = var("RELAY_CLIENT_BUFFER") {
            config.client_buffer = parse_capacity("RELAY_CLIENT_BUFFER", value)?;
        }
        if let Some(value) = var("RELAY_PERSIST_TIMEOUT_MS") {
            let ms: u64 = parse("RELAY_PERSIST_TIMEOUT_MS", value)?;
            config.persist_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

// tokio channels panic on a zero capacity
fn parse_capacity(key: &'static str, value: String) -> Result<usize, ConfigError> {
    match parse::<usize>(key, value.clone())? {
        0 => Err(ConfigError::InvalidValue { key, value }),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(None, vars(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_ADDR);
        assert_eq!(config.command_buffer, DEFAULT_COMMAND_BUFFER);
        assert_eq!(config.persist_timeout, DEFAULT_PERSIST_TIMEOUT);
    }

    #[test]
    fn test_argument_wins_over_env() {
        let config = Config::from_lookup(
            Some("127.0.0.1:9000".into()),
            vars(&[("RELAY_ADDR", "127.0.0.1:9001"), ("PORT", "9002")]),
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_port_binds_all_interfaces() {
        let config = Config::from_lookup(None, vars(&[("PORT", "5000")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
    }

    #[test]
    fn test_tuning_overrides() {
        let config = Config::from_lookup(
            None,
            vars(&[
                ("RELAY_CLIENT_BUFFER", "8"),
                ("RELAY_PERSIST_TIMEOUT_MS", "250"),
            ]),
        )
        .unwrap();
        assert_eq!(config.client_buffer, 8);
        assert_eq!(config.persist_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_lookup(None, vars(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(None, vars(&[("RELAY_COMMAND_BUFFER", "0")])).is_err());
    }
}
