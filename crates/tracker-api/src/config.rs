//! Server configuration read from the environment.

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

pub const DEFAULT_STORAGE_URI: &str = "asset_tracker.db";
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_HOST: &str = "0.0.0.0";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a valid port number, got '{value}'")]
    InvalidPort { var: &'static str, value: String },

    #[error("ASSET_TRACKER_HOST must be an IP address, got '{0}'")]
    InvalidHost(String),

    #[error("Storage location cannot be empty")]
    EmptyStorageUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub storage_uri: String,
    pub host: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    /// Load from process environment variables:
    /// - `ASSET_TRACKER_DB` or `ASSET_TRACKER_DATABASE` (default `asset_tracker.db`)
    /// - `ASSET_TRACKER_PORT` or `PORT` (default 8081)
    /// - `ASSET_TRACKER_HOST` (default `0.0.0.0`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&'static str]| {
            names
                .iter()
                .find_map(|name| lookup(name).map(|value| (*name, value)))
        };

        let storage_uri = first(&["ASSET_TRACKER_DB", "ASSET_TRACKER_DATABASE"])
            .map(|(_, value)| value)
            .unwrap_or_else(|| DEFAULT_STORAGE_URI.to_string());
        if storage_uri.trim().is_empty() {
            return Err(ConfigError::EmptyStorageUri);
        }

        let port = match first(&["ASSET_TRACKER_PORT", "PORT"]) {
            Some((var, value)) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { var, value })?,
            None => DEFAULT_PORT,
        };

        let host_value = lookup("ASSET_TRACKER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = host_value
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_value.clone()))?;

        Ok(Self {
            storage_uri,
            host,
            port,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
