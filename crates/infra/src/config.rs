//! Configuration loading and representation.
//!
//! Everything is read from environment variables; unset variables fall back
//! to defaults suitable for the docker-compose setup. Malformed values are
//! rejected rather than silently defaulted.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::tx::RetryPolicy;

/// Upper bound for `EXPORT_MAX_RETRIES`.
pub const MAX_EXPORT_RETRIES: u32 = 10;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Database connection and pool settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Pool capacity
    pub pool_size: u32,
    /// How long a request waits for a pooled connection
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "db".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "job_result_db".to_string(),
            pool_size: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Where export artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub export_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("/exports"),
        }
    }
}

/// HTTP listener and edge settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Requests allowed per client IP per one-second window (0 = unlimited)
    pub rate_limit_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            rate_limit_per_second: 10,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub retry: RetryPolicy,
    pub http: HttpConfig,
}

impl ServiceConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()),
            host: text("DB_HOST", &defaults.database.host),
            port: parse_or(&lookup, "DB_PORT", defaults.database.port)?,
            user: text("DB_USER", &defaults.database.user),
            password: text("DB_PASSWORD", &defaults.database.password),
            name: text("DB_NAME", &defaults.database.name),
            pool_size: parse_or(&lookup, "DB_POOL_SIZE", defaults.database.pool_size)?,
            acquire_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_MS",
                defaults.database.acquire_timeout.as_millis() as u64,
            )?),
        };
        if database.pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_POOL_SIZE",
                value: "0".to_string(),
                reason: "pool must hold at least one connection".to_string(),
            });
        }

        let export = ExportConfig {
            export_dir: lookup("EXPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export.export_dir),
        };

        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "EXPORT_MAX_RETRIES", defaults.retry.max_retries)?,
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "EXPORT_BACKOFF_BASE_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            ..defaults.retry
        };
        if retry.max_retries > MAX_EXPORT_RETRIES {
            return Err(ConfigError::Invalid {
                key: "EXPORT_MAX_RETRIES",
                value: retry.max_retries.to_string(),
                reason: format!("at most {MAX_EXPORT_RETRIES} retries are allowed"),
            });
        }

        let http = HttpConfig {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.http.bind_addr)?,
            port: parse_or(&lookup, "PORT", defaults.http.port)?,
            rate_limit_per_second: parse_or(
                &lookup,
                "RATE_LIMIT_PER_SECOND",
                defaults.http.rate_limit_per_second,
            )?,
        };

        Ok(Self {
            database,
            export,
            retry,
            http,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.database.pool_size, 10);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.export.export_dir, PathBuf::from("/exports"));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(200));
        assert_eq!(config.http.socket_addr().port(), 3000);
    }

    #[test]
    fn reads_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("DB_HOST", "pg.internal"),
            ("DB_PORT", "6543"),
            ("DB_POOL_SIZE", "25"),
            ("DB_ACQUIRE_TIMEOUT_MS", "1500"),
            ("EXPORTS_DIR", "/var/lib/exports"),
            ("EXPORT_MAX_RETRIES", "5"),
            ("EXPORT_BACKOFF_BASE_MS", "50"),
            ("PORT", "8080"),
            ("RATE_LIMIT_PER_SECOND", "0"),
        ]))
        .unwrap();

        assert_eq!(config.database.host, "pg.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.pool_size, 25);
        assert_eq!(config.database.acquire_timeout, Duration::from_millis(1500));
        assert_eq!(config.export.export_dir, PathBuf::from("/var/lib/exports"));
        assert_eq!(config.retry.max_attempts(), 6);
        assert_eq!(config.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.rate_limit_per_second, 0);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("DB_POOL_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_POOL_SIZE", .. }));

        let err = ServiceConfig::from_lookup(lookup_from(&[("DB_POOL_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DB_POOL_SIZE", .. }));
    }

    #[test]
    fn rejects_unbounded_retry_counts() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("EXPORT_MAX_RETRIES", "4294967295")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "EXPORT_MAX_RETRIES", .. }));

        let err = ServiceConfig::from_lookup(lookup_from(&[("EXPORT_MAX_RETRIES", "11")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "EXPORT_MAX_RETRIES", .. }));

        let config =
            ServiceConfig::from_lookup(lookup_from(&[("EXPORT_MAX_RETRIES", "10")])).unwrap();
        assert_eq!(config.retry.max_attempts(), 11);
    }

    #[test]
    fn blank_database_url_is_ignored() {
        let config = ServiceConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database.url.is_none());
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = DatabaseConfig {
            url: Some("postgres://u:hunter2@h/db".to_string()),
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
    }
}
