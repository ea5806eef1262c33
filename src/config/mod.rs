//! Configuration module for the Blood Bridge backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;

use crate::lifecycle::DEFAULT_COOLDOWN_DAYS;

/// Upper bound for day-valued settings.
const MAX_DAYS: i64 = 3650;

/// A variable was set but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid value for {}: {:?}", self.variable, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HMAC secret for bearer tokens; without it every API call is rejected
    pub jwt_secret: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Radius for matching donors to a new request
    pub match_radius_km: f64,
    /// Minimum time between donations
    pub cooldown_days: i64,
    /// Lifetime of a notification
    pub notification_ttl_days: i64,
    /// Base URL of a Nominatim-compatible geocoder
    pub geocoder_url: Option<String>,
    pub geocoder_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            db_path: PathBuf::from("./data/bloodbridge.sqlite"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            log_level: "info".to_string(),
            match_radius_km: 30.0,
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
            notification_ttl_days: 30,
            geocoder_url: None,
            geocoder_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Self {
            jwt_secret: non_empty("BLOODBRIDGE_JWT_SECRET"),
            db_path: non_empty("BLOODBRIDGE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            bind_addr: parsed("BLOODBRIDGE_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            log_level: non_empty("BLOODBRIDGE_LOG_LEVEL").unwrap_or(defaults.log_level),
            match_radius_km: checked("BLOODBRIDGE_MATCH_RADIUS_KM", |km: &f64| {
                km.is_finite() && *km > 0.0
            })?
            .unwrap_or(defaults.match_radius_km),
            cooldown_days: checked("BLOODBRIDGE_COOLDOWN_DAYS", |days: &i64| {
                (0..=MAX_DAYS).contains(days)
            })?
            .unwrap_or(defaults.cooldown_days),
            notification_ttl_days: checked("BLOODBRIDGE_NOTIFICATION_TTL_DAYS", |days: &i64| {
                (1..=MAX_DAYS).contains(days)
            })?
            .unwrap_or(defaults.notification_ttl_days),
            geocoder_url: non_empty("BLOODBRIDGE_GEOCODER_URL"),
            geocoder_api_key: non_empty("BLOODBRIDGE_GEOCODER_API_KEY"),
        })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::days(self.cooldown_days.clamp(0, MAX_DAYS))
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::days(self.notification_ttl_days.clamp(1, MAX_DAYS))
    }
}

fn non_empty(variable: &str) -> Option<String> {
    env::var(variable)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(variable: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty(variable) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { variable, value }),
    }
}

/// Like `parsed`, but also rejects values outside the accepted range.
fn checked<T: std::str::FromStr>(
    variable: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Result<Option<T>, ConfigError> {
    match parsed::<T>(variable)? {
        Some(value) if !accept(&value) => Err(ConfigError {
            variable,
            value: non_empty(variable).unwrap_or_default(),
        }),
        value => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "BLOODBRIDGE_JWT_SECRET",
        "BLOODBRIDGE_DB_PATH",
        "BLOODBRIDGE_BIND_ADDR",
        "BLOODBRIDGE_LOG_LEVEL",
        "BLOODBRIDGE_MATCH_RADIUS_KM",
        "BLOODBRIDGE_COOLDOWN_DAYS",
        "BLOODBRIDGE_NOTIFICATION_TTL_DAYS",
        "BLOODBRIDGE_GEOCODER_URL",
        "BLOODBRIDGE_GEOCODER_API_KEY",
    ];

    // Both cases live in one test because they share process-wide environment variables.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert!(config.jwt_secret.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/bloodbridge.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.match_radius_km, 30.0);
        assert_eq!(config.cooldown(), Duration::days(56));
        assert_eq!(config.notification_ttl(), Duration::days(30));
        assert!(config.geocoder_url.is_none());

        env::set_var("BLOODBRIDGE_COOLDOWN_DAYS", "ninety");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.variable, "BLOODBRIDGE_COOLDOWN_DAYS");

        env::set_var("BLOODBRIDGE_COOLDOWN_DAYS", "90");
        env::set_var("BLOODBRIDGE_MATCH_RADIUS_KM", "12.5");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cooldown(), Duration::days(90));
        assert_eq!(config.match_radius_km, 12.5);

        let out_of_range = [
            ("BLOODBRIDGE_COOLDOWN_DAYS", "999999999999999"),
            ("BLOODBRIDGE_COOLDOWN_DAYS", "-1"),
            ("BLOODBRIDGE_MATCH_RADIUS_KM", "-5"),
            ("BLOODBRIDGE_MATCH_RADIUS_KM", "NaN"),
            ("BLOODBRIDGE_MATCH_RADIUS_KM", "inf"),
            ("BLOODBRIDGE_NOTIFICATION_TTL_DAYS", "-30"),
            ("BLOODBRIDGE_NOTIFICATION_TTL_DAYS", "0"),
        ];
        for (var, value) in out_of_range {
            for var in VARS {
                env::remove_var(var);
            }
            env::set_var(var, value);
            let err = Config::from_env().unwrap_err();
            assert_eq!(err.variable, var, "{}={}", var, value);
            assert_eq!(err.value, value);
        }

        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_durations_stay_bounded() {
        let config = Config {
            cooldown_days: 999_999_999_999_999,
            notification_ttl_days: -30,
            ..Config::default()
        };
        assert_eq!(config.cooldown(), Duration::days(MAX_DAYS));
        assert_eq!(config.notification_ttl(), Duration::days(1));
    }
}
