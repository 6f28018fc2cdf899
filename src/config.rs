//! Environment-driven configuration.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_PATH: &str = "./pr-reviewer.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// SQLite file; its parent directory is created on startup.
    pub database_path: PathBuf,
    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a config from any variable source. Unset or blank values take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => parse_port(&v)?,
            None => defaults.port,
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => parse_bind_addr(&v)?,
            None => defaults.bind_addr,
        };

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => parse_max_connections(&v)?,
            None => defaults.db_max_connections,
        };

        Ok(Config {
            bind_addr,
            port,
            database_path,
            db_max_connections,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
        var: "PORT",
        value: value.to_string(),
        expected: "a port number",
    })
}

pub fn parse_bind_addr(value: &str) -> Result<IpAddr, ConfigError> {
    value.trim().parse::<IpAddr>().map_err(|_| ConfigError::Invalid {
        var: "BIND_ADDR",
        value: value.to_string(),
        expected: "an IP address",
    })
}

/// Pool size must be at least one connection.
pub fn parse_max_connections(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::Invalid {
            var: "DB_MAX_CONNECTIONS",
            value: value.to_string(),
            expected: "a positive integer",
        }),
    }
}
