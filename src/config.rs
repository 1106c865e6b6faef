//! Configuration management.
//!
//! Everything is read from environment variables at startup:
//! - `TASK_API_HOST` / `TASK_API_PORT` - listen address (default `0.0.0.0:8080`)
//! - `TASK_API_CORS_ORIGIN` - browser origin allowed by CORS (default `http://localhost:3000`)
//! - `TASK_API_STORE` - `sqlite` (default) or `memory`
//! - `TASK_API_DATABASE` - SQLite file path (default `data/tasks.db`)

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Where task documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub store: StoreKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            store: StoreKind::Sqlite(PathBuf::from("data/tasks.db")),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys use defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let host = get("TASK_API_HOST").unwrap_or(defaults.host);
        let port = match get("TASK_API_PORT") {
            Some(raw) => u16::from_str(raw.trim())
                .with_context(|| format!("TASK_API_PORT is not a valid port: {}", raw))?,
            None => defaults.port,
        };

        let cors_origin = get("TASK_API_CORS_ORIGIN").unwrap_or(defaults.cors_origin);
        axum::http::HeaderValue::from_str(&cors_origin)
            .with_context(|| format!("TASK_API_CORS_ORIGIN is not a valid origin: {}", cors_origin))?;

        let database = get("TASK_API_DATABASE").map(PathBuf::from);
        let store = match get("TASK_API_STORE").as_deref().map(str::trim) {
            None | Some("sqlite") => match database {
                Some(path) => StoreKind::Sqlite(path),
                None => defaults.store,
            },
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!(
                "TASK_API_STORE must be 'sqlite' or 'memory', got '{}'",
                other
            ),
        };

        Ok(Self {
            host,
            port,
            cors_origin,
            store,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
