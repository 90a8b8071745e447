//! Process configuration, read from the environment (`.env` honoured).

use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub max_connections: u32,
    /// Re-reads allowed after a concurrent write beat ours.
    pub max_retries: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty()).ok_or(ConfigError::Missing("DATABASE_URL"))?;
        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", 8083)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            max_retries: parse_or(&lookup, "STOCK_MAX_RETRIES", 3)?,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/pos")])).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.nats_url, None);
    }

    #[test]
    fn test_missing_database_url() {
        assert_eq!(Config::from_lookup(lookup(&[])), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("STOCK_MAX_RETRIES", "muchos")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "STOCK_MAX_RETRIES", value: "muchos".into() });
    }
}
