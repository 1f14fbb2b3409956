//! Server configuration read from the environment.
//!
//! ## Configuration
//!
//! Environment variables (a `.env` file is loaded first when present):
//! - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
//! - `DATABASE_URL`: Postgres connection string; unset runs on the in-memory store
//! - `DB_MAX_CONNECTIONS` / `DB_MIN_CONNECTIONS`: pool bounds (default 10 / 1)
//! - `DB_ACQUIRE_TIMEOUT_SECS`: wait for a free connection (default 30)
//! - `DB_IDLE_TIMEOUT_SECS`: close surplus idle connections after (default 600)
//! - `HEARTBEAT_INTERVAL_SECS`: heartbeat tick (default 15)
//! - `MIGRATE_ON_STARTUP`: upgrade outdated stored kits at boot (default true)
//! - `MAX_IMPORT_BYTES`: largest accepted import after base64 decoding
//!
//! Catalog variables (`CATALOG_*`) are read by `kitsync-catalog`.

use std::str::FromStr;
use std::time::Duration;

use kitsync_core::defaults;
use kitsync_core::{Error, Result};
use kitsync_db::PoolConfig;

/// Settings for the HTTP server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_pool: PoolConfig,
    pub heartbeat_interval: Duration,
    pub migrate_on_startup: bool,
    pub max_import_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            database_url: None,
            db_pool: PoolConfig::default(),
            heartbeat_interval: Duration::from_secs(defaults::HEARTBEAT_INTERVAL_SECS),
            migrate_on_startup: true,
            max_import_bytes: defaults::MAX_IMPORT_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults and
    /// unparsable values are a `Config` error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(base.host),
            port: parse_var(&lookup, "PORT", base.port)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            db_pool: PoolConfig {
                max_connections: parse_var(
                    &lookup,
                    "DB_MAX_CONNECTIONS",
                    base.db_pool.max_connections,
                )?,
                min_connections: parse_var(
                    &lookup,
                    "DB_MIN_CONNECTIONS",
                    base.db_pool.min_connections,
                )?,
                acquire_timeout: Duration::from_secs(parse_var(
                    &lookup,
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    base.db_pool.acquire_timeout.as_secs(),
                )?),
                idle_timeout: Duration::from_secs(parse_var(
                    &lookup,
                    "DB_IDLE_TIMEOUT_SECS",
                    base.db_pool.idle_timeout.as_secs(),
                )?),
            },
            heartbeat_interval: Duration::from_secs(parse_var(
                &lookup,
                "HEARTBEAT_INTERVAL_SECS",
                defaults::HEARTBEAT_INTERVAL_SECS,
            )?),
            migrate_on_startup: lookup("MIGRATE_ON_STARTUP")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(base.migrate_on_startup),
            max_import_bytes: parse_var(&lookup, "MAX_IMPORT_BYTES", base.max_import_bytes)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
    }
}
