//! Process-wide startup configuration.
//!
//! # Responsibility
//! - Read immutable runtime settings from the environment once at startup.
//! - Keep secrets (token signing key) out of defaults.
//!
//! # Invariants
//! - `MORROW_TOKEN_SECRET` is mandatory; there is no fallback secret.
//! - Configuration is read once and never mutated afterwards.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "morrow.sqlite3";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Immutable runtime configuration shared by server and scheduler.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file path.
    pub db_path: PathBuf,
    /// Listen address for the HTTP layer, `host:port`.
    pub bind_addr: String,
    /// Shared HMAC secret for token signing. Never logged.
    pub token_secret: String,
    /// Token validity window in hours.
    pub token_ttl_hours: i64,
    /// Log level name accepted by `init_logging`.
    pub log_level: String,
    /// Optional absolute log directory; stderr logging when absent.
    pub log_dir: Option<PathBuf>,
}

/// Configuration loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar {
        name: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVar(name) => write!(f, "required environment variable {name} is not set"),
            Self::InvalidVar { name, message } => {
                write!(f, "environment variable {name} is invalid: {message}")
            }
        }
    }
}

impl Error for ConfigError {}

impl AppConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token_secret = lookup("MORROW_TOKEN_SECRET")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingVar("MORROW_TOKEN_SECRET"))?;

        let token_ttl_hours = match lookup("MORROW_TOKEN_TTL_HOURS") {
            Some(raw) => {
                let parsed: i64 =
                    raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidVar {
                            name: "MORROW_TOKEN_TTL_HOURS",
                            message: format!("expected a positive integer, got `{raw}`"),
                        })?;
                if parsed <= 0 {
                    return Err(ConfigError::InvalidVar {
                        name: "MORROW_TOKEN_TTL_HOURS",
                        message: format!("expected a positive integer, got `{raw}`"),
                    });
                }
                parsed
            }
            None => DEFAULT_TOKEN_TTL_HOURS,
        };

        Ok(Self {
            db_path: lookup("MORROW_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind_addr: lookup("MORROW_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            token_secret,
            token_ttl_hours,
            log_level: lookup("MORROW_LOG_LEVEL")
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: lookup("MORROW_LOG_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn secret_is_mandatory() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("MORROW_TOKEN_SECRET"));

        let err = AppConfig::from_lookup(lookup_from(&[("MORROW_TOKEN_SECRET", "  ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("MORROW_TOKEN_SECRET"));
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("MORROW_TOKEN_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.token_ttl_hours, 24);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("MORROW_TOKEN_SECRET", "s3cret"),
            ("MORROW_TOKEN_TTL_HOURS", "zero"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar {
                name: "MORROW_TOKEN_TTL_HOURS",
                ..
            }
        ));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("MORROW_TOKEN_SECRET", "s3cret"),
            ("MORROW_TOKEN_TTL_HOURS", "-2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { .. }));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("MORROW_TOKEN_SECRET", "s3cret"),
            ("MORROW_BIND_ADDR", "0.0.0.0:9000"),
            ("MORROW_TOKEN_TTL_HOURS", "48"),
            ("MORROW_DB_PATH", "/var/lib/morrow/morrow.sqlite3"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.token_ttl_hours, 48);
        assert!(config.db_path.is_absolute());
    }
}
