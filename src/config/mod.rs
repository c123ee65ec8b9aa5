use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Seat lock timing and notification fan-out
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub lock_lease_ms: u64,
    pub lock_wait_ms: u64,
    pub notify_capacity: usize,
}

impl BookingConfig {
    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

// Feature flags for the destructive and administrative endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_reset: bool,
    pub enable_admin: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        // Reset wipes every seat, so production must opt in explicitly.
        let reset_default = if environment == "production" { "false" } else { "true" };

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", env::var("PORT").ok(), "8080")?,
                environment,
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parse_var("DB_POOL_SIZE", env::var("DB_POOL_SIZE").ok(), "20")?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
            },
            booking: BookingConfig {
                lock_lease_ms: parse_var("LOCK_LEASE_MS", env::var("LOCK_LEASE_MS").ok(), "5000")?,
                lock_wait_ms: parse_var("LOCK_WAIT_MS", env::var("LOCK_WAIT_MS").ok(), "0")?,
                notify_capacity: parse_var(
                    "NOTIFY_CAPACITY",
                    env::var("NOTIFY_CAPACITY").ok(),
                    "1024",
                )?,
            },
            features: FeatureFlags {
                enable_reset: parse_var("ENABLE_RESET", env::var("ENABLE_RESET").ok(), reset_default)?,
                enable_admin: parse_var("ENABLE_ADMIN", env::var("ENABLE_ADMIN").ok(), "true")?,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_var<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: &str,
) -> Result<T, ConfigError> {
    let value = raw.unwrap_or_else(|| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let port: u16 = parse_var("PORT", None, "8080").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_var_prefers_the_raw_value() {
        let lease: u64 = parse_var("LOCK_LEASE_MS", Some(" 250 ".to_string()), "5000").unwrap();
        assert_eq!(lease, 250);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        let err = parse_var::<bool>("ENABLE_RESET", Some("maybe".to_string()), "true").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ENABLE_RESET", .. }));
        assert_eq!(err.to_string(), "ENABLE_RESET has invalid value \"maybe\"");
    }

    #[test]
    fn booking_durations_are_in_millis() {
        let booking = BookingConfig {
            lock_lease_ms: 5000,
            lock_wait_ms: 0,
            notify_capacity: 16,
        };
        assert_eq!(booking.lock_lease(), Duration::from_secs(5));
        assert_eq!(booking.lock_wait(), Duration::ZERO);
    }
}
