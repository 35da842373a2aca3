use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use keyrelay_core::{RelayError, DEFAULT_QUEUE_CAPACITY};
use serde::Deserialize;

/// KeyRelay runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Capacity of the inbound queue feeding the dispatcher
    pub queue_capacity: usize,
    /// Client page served at `/`
    pub index_path: PathBuf,
    /// Directory for the rolling JSON log; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            index_path: PathBuf::from("index.html"),
            log_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_address: lookup("KEYRELAY_BIND").unwrap_or(defaults.bind_address),
            port: parse_var(&lookup, "KEYRELAY_PORT")?.unwrap_or(defaults.port),
            queue_capacity: match parse_var::<usize, _>(&lookup, "KEYRELAY_QUEUE_CAPACITY")? {
                Some(0) => {
                    return Err(RelayError::Config(
                        "KEYRELAY_QUEUE_CAPACITY must be at least 1".into(),
                    ))
                }
                Some(n) => n,
                None => defaults.queue_capacity,
            },
            index_path: lookup("KEYRELAY_INDEX")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            log_dir: lookup("KEYRELAY_LOG_DIR").map(PathBuf::from),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr, RelayError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| {
            RelayError::Config(format!("invalid bind address: {}", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, RelayError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| RelayError::Config(format!("{key}: cannot parse {raw:?}")))
        })
        .transpose()
}
