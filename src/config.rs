// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory of the filesystem object store | `./data` |
//! | `WIKI_SECRET` | Salt for title hashes | Required |
//! | `AWS_BUCKET_NAME` | Bucket holding the wiki | `wiki` |
//! | `AWS_BUCKET_REGION` | Region used in public URLs | `us-east-1` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `STORE_TIMEOUT_MS` | Deadline per object store call | `10000` |
//! | `CACHE_CAPACITY_PAGE` | Cached page versions | `10` |
//! | `CACHE_CAPACITY_USER` | Cached users | `10` |
//! | `CACHE_CAPACITY_FILE` | Cached files | `10` |
//! | `CACHE_CAPACITY_SESSION` | Cached sessions | `10` |
//! | `CACHE_CAPACITY_ARTIFACT` | Cached rendered artifacts | `10` |
//! | `PUBLISH_WORKERS` | Publish worker count | `2` |
//! | `PUBLISH_QUEUE_DEPTH` | Pending publish jobs | `64` |
//! | `SESSION_TTL_SECS` | Session lifetime | `86400` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::auth::DEFAULT_SESSION_TTL;
use crate::publish::worker::{DEFAULT_PUBLISH_QUEUE_DEPTH, DEFAULT_PUBLISH_WORKERS};
use crate::storage::stack::{CacheCapacities, DEFAULT_CACHE_CAPACITY};
use crate::storage::DEFAULT_STORE_TIMEOUT;

/// Root directory of the filesystem object store.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Secret mixed into every title hash. Changing it orphans existing pages.
pub const WIKI_SECRET_ENV: &str = "WIKI_SECRET";

pub const BUCKET_NAME_ENV: &str = "AWS_BUCKET_NAME";
pub const BUCKET_REGION_ENV: &str = "AWS_BUCKET_REGION";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const STORE_TIMEOUT_MS_ENV: &str = "STORE_TIMEOUT_MS";
pub const CACHE_CAPACITY_PAGE_ENV: &str = "CACHE_CAPACITY_PAGE";
pub const CACHE_CAPACITY_USER_ENV: &str = "CACHE_CAPACITY_USER";
pub const CACHE_CAPACITY_FILE_ENV: &str = "CACHE_CAPACITY_FILE";
pub const CACHE_CAPACITY_SESSION_ENV: &str = "CACHE_CAPACITY_SESSION";
pub const CACHE_CAPACITY_ARTIFACT_ENV: &str = "CACHE_CAPACITY_ARTIFACT";
pub const PUBLISH_WORKERS_ENV: &str = "PUBLISH_WORKERS";
pub const PUBLISH_QUEUE_DEPTH_ENV: &str = "PUBLISH_QUEUE_DEPTH";
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";

/// `json` or `pretty`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_BUCKET_NAME: &str = "wiki";
pub const DEFAULT_BUCKET_REGION: &str = "us-east-1";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

impl LogFormat {
    pub fn from_env() -> Self {
        parse_or(LOG_FORMAT_ENV, std::env::var(LOG_FORMAT_ENV).ok(), LogFormat::default())
    }
}

/// Everything the binary needs to wire the wiki together.
#[derive(Clone, PartialEq, Eq)]
pub struct WikiConfig {
    pub data_dir: PathBuf,
    pub secret: String,
    pub bucket: String,
    pub region: String,
    pub host: String,
    pub port: u16,
    pub store_timeout: Duration,
    pub capacities: CacheCapacities,
    pub publish_workers: usize,
    pub publish_queue_depth: usize,
    pub session_ttl: Duration,
}

impl std::fmt::Debug for WikiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiConfig")
            .field("data_dir", &self.data_dir)
            .field("secret", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("store_timeout", &self.store_timeout)
            .field("capacities", &self.capacities)
            .field("publish_workers", &self.publish_workers)
            .field("publish_queue_depth", &self.publish_queue_depth)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl WikiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparseable numbers fall back to
    /// their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = lookup(WIKI_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(WIKI_SECRET_ENV))?;
        let number = |name: &'static str, default: usize| parse_or(name, lookup(name), default);

        Ok(Self {
            data_dir: lookup(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            secret,
            bucket: lookup(BUCKET_NAME_ENV).unwrap_or_else(|| DEFAULT_BUCKET_NAME.to_string()),
            region: lookup(BUCKET_REGION_ENV).unwrap_or_else(|| DEFAULT_BUCKET_REGION.to_string()),
            host: lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(PORT_ENV, lookup(PORT_ENV), DEFAULT_PORT),
            store_timeout: Duration::from_millis(parse_or(
                STORE_TIMEOUT_MS_ENV,
                lookup(STORE_TIMEOUT_MS_ENV),
                DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )),
            capacities: CacheCapacities {
                pages: number(CACHE_CAPACITY_PAGE_ENV, DEFAULT_CACHE_CAPACITY),
                artifacts: number(CACHE_CAPACITY_ARTIFACT_ENV, DEFAULT_CACHE_CAPACITY),
                files: number(CACHE_CAPACITY_FILE_ENV, DEFAULT_CACHE_CAPACITY),
                users: number(CACHE_CAPACITY_USER_ENV, DEFAULT_CACHE_CAPACITY),
                sessions: number(CACHE_CAPACITY_SESSION_ENV, DEFAULT_CACHE_CAPACITY),
            },
            publish_workers: number(PUBLISH_WORKERS_ENV, DEFAULT_PUBLISH_WORKERS),
            publish_queue_depth: number(PUBLISH_QUEUE_DEPTH_ENV, DEFAULT_PUBLISH_QUEUE_DEPTH),
            session_ttl: Duration::from_secs(parse_or(
                SESSION_TTL_SECS_ENV,
                lookup(SESSION_TTL_SECS_ENV),
                DEFAULT_SESSION_TTL.as_secs(),
            )),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(variable = name, value = %raw, error = %e, "Invalid value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<WikiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WikiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::Missing(WIKI_SECRET_ENV))
        ));
        assert!(config(&[(WIKI_SECRET_ENV, "")]).is_err());
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[(WIKI_SECRET_ENV, "s")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.bucket, DEFAULT_BUCKET_NAME);
        assert_eq!(cfg.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(cfg.capacities, CacheCapacities::default());
        assert_eq!(cfg.session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let cfg = config(&[
            (WIKI_SECRET_ENV, "s"),
            (PORT_ENV, "9000"),
            (CACHE_CAPACITY_PAGE_ENV, "50"),
            (PUBLISH_WORKERS_ENV, "lots"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.capacities.pages, 50);
        assert_eq!(cfg.publish_workers, DEFAULT_PUBLISH_WORKERS);
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = config(&[(WIKI_SECRET_ENV, "hunter2")]).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
