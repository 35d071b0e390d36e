use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_RETELL_BASE_URL: &str = "https://api.retellai.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set!")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub retell_api_key: String,
    pub retell_base_url: String,
    pub retell_timeout: Duration,
    pub agent_id: String,
    pub from_number: String,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let host: IpAddr = parse_or(get("HOST"), "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(get("PORT"), "PORT", 5000)?;
        let timeout_secs: u64 = parse_or(get("RETELL_TIMEOUT_SECS"), "RETELL_TIMEOUT_SECS", 30)?;

        Ok(Self {
            retell_api_key: required("RETELL_API_KEY")?,
            retell_base_url: get("RETELL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_RETELL_BASE_URL.to_string()),
            retell_timeout: Duration::from_secs(timeout_secs),
            agent_id: required("AGENT_ID")?,
            from_number: required("FROM_NUMBER")?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                5,
            )?,
            bind_addr: SocketAddr::new(host, port),
            log_level: parse_or(get("LOG_LEVEL"), "LOG_LEVEL", LevelFilter::INFO)?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}
