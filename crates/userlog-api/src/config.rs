//! Process configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use userlog_core::retry::RetryPolicy;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_EVENTS_TOPIC: &str = "user-events";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings for the API server and the consumer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `DATABASE_URL`, required.
    pub database_url: String,
    /// `HOST`, default `0.0.0.0`.
    pub host: String,
    /// `PORT`, default 3000.
    pub port: u16,
    /// `EVENTS_TOPIC`, default `user-events`.
    pub events_topic: String,
    /// `DEAD_LETTER_TOPIC`; dead-lettering is off when unset.
    pub dead_letter_topic: Option<String>,
    /// `DB_MAX_CONNECTIONS`, default 10.
    pub db_max_connections: u32,
    /// Built from `RETRY_MAX_ATTEMPTS` and `RETRY_BACKOFF_MS`.
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing, a numeric
    /// variable does not parse, or `DEAD_LETTER_TOPIC` equals `EVENTS_TOPIC`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".into())
            })?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_backoff: lookup("RETRY_BACKOFF_MS")
                .map(|raw| parse::<u64>("RETRY_BACKOFF_MS", &raw).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.initial_backoff),
            multiplier: defaults.multiplier,
        };
        if retry.max_attempts == 0 {
            return Err(AppError::Config("RETRY_MAX_ATTEMPTS must be at least 1".into()));
        }

        let events_topic =
            lookup("EVENTS_TOPIC").unwrap_or_else(|| DEFAULT_EVENTS_TOPIC.to_owned());
        let dead_letter_topic = lookup("DEAD_LETTER_TOPIC").filter(|v| !v.is_empty());
        if dead_letter_topic.as_deref() == Some(events_topic.as_str()) {
            return Err(AppError::Config(format!(
                "DEAD_LETTER_TOPIC must differ from EVENTS_TOPIC ('{events_topic}')"
            )));
        }

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            events_topic,
            dead_letter_topic,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            retry,
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::Config(format!("{key} is invalid ('{raw}'): {e}")))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |raw| parse(key, &raw))
}
