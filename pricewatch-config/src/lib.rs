//! Configuration loading for the pricewatch service.
//!
//! All settings come from the environment (optionally seeded from a
//! `.env` file by the server binary). Loading goes through a lookup
//! seam so tests can drive the loader without mutating process-wide
//! environment state.

use std::time::Duration;

use chrono::NaiveTime;
use url::Url;

/// Environment variable names recognized by [`Config::from_env`].
pub mod keys {
    /// Registry base URL.
    pub const BACKEND_URL: &str = "BACKEND_URL";
    /// Seconds between fetch cycles.
    pub const FETCH_INTERVAL: &str = "FETCH_INTERVAL";
    /// Optional `HH:MM` daily trigger; replaces the interval trigger.
    pub const FETCH_AT: &str = "FETCH_AT";
    /// Browser visibility toggle.
    pub const HEADLESS: &str = "HEADLESS";
    /// WebDriver (geckodriver) endpoint.
    pub const WEBDRIVER_URL: &str = "WEBDRIVER_URL";
    /// Quote page base URL.
    pub const QUOTE_URL: &str = "QUOTE_URL";
    /// Health listener host.
    pub const SERVER_HOST: &str = "SERVER_HOST";
    /// Health listener port.
    pub const SERVER_PORT: &str = "SERVER_PORT";
}

const DEFAULT_BACKEND_URL: &str = "http://backend:8080/api/instruments";
const DEFAULT_FETCH_INTERVAL_SECS: u64 = 900;
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
const DEFAULT_QUOTE_URL: &str =
    "https://markets.ft.com/data/etfs/tearsheet/summary";
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 5000;

/// A configuration value that failed validation. All of these are
/// fatal at startup; the scheduler must not start on a malformed
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL-valued variable did not parse.
    #[error("{var} is not a valid URL ({value:?}): {source}")]
    InvalidUrl {
        /// Offending variable name.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
        /// Parser diagnostics.
        source: url::ParseError,
    },

    /// `FETCH_INTERVAL` was not a positive integer.
    #[error("{var} must be a positive number of seconds, got {value:?}")]
    InvalidInterval {
        /// Offending variable name.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },

    /// A boolean toggle held something other than true/false.
    #[error("{var} must be a boolean toggle, got {value:?}")]
    InvalidBool {
        /// Offending variable name.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },

    /// `FETCH_AT` was not a valid `HH:MM` time of day.
    #[error("{var} must be a HH:MM time of day, got {value:?}")]
    InvalidDailyTime {
        /// Offending variable name.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },

    /// `SERVER_PORT` was not a valid port number.
    #[error("{var} must be a port number, got {value:?}")]
    InvalidPort {
        /// Offending variable name.
        var: &'static str,
        /// Raw value as found in the environment.
        value: String,
    },
}

/// Health listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host for the liveness endpoint.
    pub host: String,
    /// Bind port for the liveness endpoint.
    pub port: u16,
}

/// Runtime configuration for the price-refresh service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry base URL (`GET {backend_url}`, `PUT {backend_url}/{id}`).
    pub backend_url: Url,
    /// Interval between fetch cycles. Ignored when `fetch_at` is set.
    pub fetch_interval: Duration,
    /// Optional daily time-of-day trigger; replaces the interval
    /// trigger when present.
    pub fetch_at: Option<NaiveTime>,
    /// Whether the browser runs headless.
    pub headless: bool,
    /// WebDriver endpoint the scraper connects to.
    pub webdriver_url: Url,
    /// Quote page base URL; the symbol is appended as `?s={symbol}`.
    pub quote_url: Url,
    /// Liveness endpoint listener settings.
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Missing variables take their defaults; present-but-invalid
    /// values are errors.
    pub fn load_from(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let backend_url = parse_url(
            keys::BACKEND_URL,
            lookup(keys::BACKEND_URL),
            DEFAULT_BACKEND_URL,
        )?;
        let webdriver_url = parse_url(
            keys::WEBDRIVER_URL,
            lookup(keys::WEBDRIVER_URL),
            DEFAULT_WEBDRIVER_URL,
        )?;
        let quote_url = parse_url(
            keys::QUOTE_URL,
            lookup(keys::QUOTE_URL),
            DEFAULT_QUOTE_URL,
        )?;

        let fetch_interval = match lookup(keys::FETCH_INTERVAL) {
            Some(raw) => parse_interval(keys::FETCH_INTERVAL, &raw)?,
            None => Duration::from_secs(DEFAULT_FETCH_INTERVAL_SECS),
        };

        let fetch_at = match lookup(keys::FETCH_AT) {
            Some(raw) => Some(parse_daily_time(keys::FETCH_AT, &raw)?),
            None => None,
        };

        let headless = match lookup(keys::HEADLESS) {
            Some(raw) => parse_bool(keys::HEADLESS, &raw)?,
            None => true,
        };

        let host = lookup(keys::SERVER_HOST)
            .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string());
        let port = match lookup(keys::SERVER_PORT) {
            Some(raw) => {
                raw.trim().parse::<u16>().map_err(|_| {
                    ConfigError::InvalidPort {
                        var: keys::SERVER_PORT,
                        value: raw,
                    }
                })?
            }
            None => DEFAULT_SERVER_PORT,
        };

        Ok(Self {
            backend_url,
            fetch_interval,
            fetch_at,
            headless,
            webdriver_url,
            quote_url,
            server: ServerConfig { host, port },
        })
    }
}

fn parse_url(
    var: &'static str,
    raw: Option<String>,
    default: &str,
) -> Result<Url, ConfigError> {
    let value = raw.unwrap_or_else(|| default.to_string());
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
        var,
        value,
        source,
    })
}

fn parse_interval(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidInterval {
            var,
            value: raw.to_string(),
        }),
    }
}

fn parse_daily_time(var: &'static str, raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
        ConfigError::InvalidDailyTime {
            var,
            value: raw.to_string(),
        }
    })
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: raw.to_string(),
        }),
    }
}
