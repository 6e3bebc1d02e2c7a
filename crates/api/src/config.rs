//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use cart_store::postgres::DEFAULT_CALL_TIMEOUT;
use common::UserId;
use engine::{MergeSettings, ResolverSettings, RetryPolicy};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where the guest token travels and how long the cookie lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestCookieConfig {
    pub cookie_name: String,
    pub header_name: String,
    pub max_age: Duration,
}

impl Default for GuestCookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: "guest_cart_token".to_string(),
            header_name: "x-guest-token".to_string(),
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT` — bind address (default: `0.0.0.0:3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `pretty` or `json`
/// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` — cart store; unset runs in memory
/// - `PUBLIC_API_KEY` — static key that never identifies a user
/// - `AUTH_TOKENS` — `token=user-uuid,...` accepted bearer tokens
/// - `STORE_CALL_TIMEOUT_MS` — deadline for one store procedure call
/// - `MERGE_TIMEOUT_MS`, `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_DELAY_MS`
/// - `GUEST_COOKIE_NAME`, `GUEST_TOKEN_HEADER`, `GUEST_COOKIE_MAX_AGE_DAYS`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub public_api_key: Option<String>,
    pub auth_tokens: HashMap<String, UserId>,
    pub merge: MergeSettings,
    pub retry: RetryPolicy,
    pub guest_cookie: GuestCookieConfig,
    pub store_call_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    var: "LOG_FORMAT",
                    reason: format!("expected pretty or json, got {other}"),
                });
            }
        };

        let auth_tokens = match var("AUTH_TOKENS") {
            Some(raw) => parse_auth_tokens(&raw)?,
            None => HashMap::new(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", var("PORT"), defaults.port)?,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            )?,
            public_api_key: var("PUBLIC_API_KEY"),
            auth_tokens,
            merge: MergeSettings {
                timeout: Duration::from_millis(parse_or(
                    "MERGE_TIMEOUT_MS",
                    var("MERGE_TIMEOUT_MS"),
                    defaults.merge.timeout.as_millis() as u64,
                )?),
            },
            retry: RetryPolicy {
                max_attempts: parse_or(
                    "RETRY_MAX_ATTEMPTS",
                    var("RETRY_MAX_ATTEMPTS"),
                    defaults.retry.max_attempts,
                )?
                .max(1),
                base_delay: Duration::from_millis(parse_or(
                    "RETRY_BASE_DELAY_MS",
                    var("RETRY_BASE_DELAY_MS"),
                    defaults.retry.base_delay.as_millis() as u64,
                )?),
            },
            guest_cookie: GuestCookieConfig {
                cookie_name: var("GUEST_COOKIE_NAME").unwrap_or(defaults.guest_cookie.cookie_name),
                header_name: var("GUEST_TOKEN_HEADER")
                    .map(|h| h.to_ascii_lowercase())
                    .unwrap_or(defaults.guest_cookie.header_name),
                max_age: days(
                    "GUEST_COOKIE_MAX_AGE_DAYS",
                    parse_or(
                        "GUEST_COOKIE_MAX_AGE_DAYS",
                        var("GUEST_COOKIE_MAX_AGE_DAYS"),
                        30,
                    )?,
                )?,
            },
            store_call_timeout: Duration::from_millis(parse_or(
                "STORE_CALL_TIMEOUT_MS",
                var("STORE_CALL_TIMEOUT_MS"),
                defaults.store_call_timeout.as_millis() as u64,
            )?),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            public_api_key: self.public_api_key.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 5,
            public_api_key: None,
            auth_tokens: HashMap::new(),
            merge: MergeSettings::default(),
            retry: RetryPolicy::default(),
            guest_cookie: GuestCookieConfig::default(),
            store_call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: e.to_string(),
        }),
    }
}

fn days(var: &'static str, count: u64) -> Result<Duration, ConfigError> {
    count
        .checked_mul(24 * 60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError {
            var,
            reason: format!("{count} days is out of range"),
        })
}

/// Parses `token=user-uuid` pairs separated by commas.
pub fn parse_auth_tokens(raw: &str) -> Result<HashMap<String, UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, user) = entry.split_once('=').ok_or_else(|| ConfigError {
                var: "AUTH_TOKENS",
                reason: format!("expected token=user-id, got {entry}"),
            })?;
            let user_id = UserId::parse(user.trim()).map_err(|e| ConfigError {
                var: "AUTH_TOKENS",
                reason: e.to_string(),
            })?;
            Ok((token.trim().to_string(), user_id))
        })
        .collect()
}
