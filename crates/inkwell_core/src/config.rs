//! Immutable runtime configuration.
//!
//! Built once at startup and handed to services; nothing below this module
//! reads process environment.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fallback signing secret used when `JWT_SECRET` is unset.
///
/// Anyone who knows this value can mint tokens. Deployments must set
/// `JWT_SECRET`.
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ARTICLE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_DATABASE_PATH: &str = "inkwell.sqlite3";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub article_cache_ttl: Duration,
    pub bcrypt_cost: u32,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            article_cache_ttl: DEFAULT_ARTICLE_CACHE_TTL,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl CoreConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = non_blank(lookup("INKWELL_DATABASE_PATH")) {
            config.database_path = PathBuf::from(path);
        }

        match non_blank(lookup("JWT_SECRET")) {
            Some(secret) => config.jwt_secret = secret,
            None => warn!(
                "event=config_default_secret module=config status=warn reason=JWT_SECRET_unset"
            ),
        }

        if let Some(raw) = non_blank(lookup("INKWELL_BCRYPT_COST")) {
            config.bcrypt_cost = parse_bcrypt_cost(&raw)?;
        }

        if let Some(raw) = non_blank(lookup("INKWELL_ARTICLE_CACHE_TTL_SECS")) {
            config.article_cache_ttl = parse_cache_ttl(&raw)?;
        }

        if let Some(level) = non_blank(lookup("INKWELL_LOG_LEVEL")) {
            config.log_level = level;
        }

        if let Some(dir) = non_blank(lookup("INKWELL_LOG_DIR")) {
            config.log_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Whether the signing secret is still the built-in fallback.
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_bcrypt_cost(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "INKWELL_BCRYPT_COST",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let cost = raw.parse::<u32>().map_err(|_| invalid("not an integer"))?;
    if !(4..=31).contains(&cost) {
        return Err(invalid("bcrypt cost must be within 4..=31"));
    }
    Ok(cost)
}

fn parse_cache_ttl(raw: &str) -> Result<Duration, ConfigError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::InvalidValue {
            key: "INKWELL_ARTICLE_CACHE_TTL_SECS",
            value: raw.to_string(),
            reason: "not a whole number of seconds".to_string(),
        })
}
