use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};
use thiserror::Error;
use time::Duration;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database URL the server keeps everything in memory.
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_index_cache_ttl_seconds")]
    pub index_cache_ttl_seconds: u32,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    pub access_token_lifetime_days: Option<u32>,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_index_cache_ttl_seconds() -> u32 {
    20
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

impl Env {
    /// Reads `.env` (if present) into the process environment, then the environment itself.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("No .env file found");
            } else {
                return Err(e.into());
            }
        }

        Ok(envy::from_env()?)
    }

    #[must_use]
    pub fn index_cache_ttl(&self) -> Duration {
        Duration::seconds(self.index_cache_ttl_seconds.into())
    }

    #[must_use]
    pub fn access_token_lifetime(&self) -> Option<Duration> {
        self.access_token_lifetime_days
            .map(|days| Duration::days(days.into()))
    }
}
