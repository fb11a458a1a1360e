//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub session_ttl: Duration,
    /// Comma-separated identifiers of agents without a showings funnel.
    pub no_showings_agents: String,
    pub rate_limit: RateLimitConfig,
    /// Key rate limits on `X-Forwarded-For` instead of the peer address. Only safe
    /// behind a reverse proxy that overwrites the header.
    pub trust_proxy: bool,
    pub openai_api_key: Option<String>,
    pub insights_model: String,
}

/// Token bucket settings: `max_requests` per `window_secs`, per client.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn capacity(&self) -> f64 {
        f64::from(self.max_requests)
    }

    pub fn refill_per_sec(&self) -> f64 {
        f64::from(self.max_requests) / self.window_secs.max(1) as f64
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:5000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Auth and Policy Settings ---
        let ttl_hours: i64 = parse_var("SESSION_TTL_HOURS", "24")?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_HOURS".to_string(),
                "must be a positive number of hours".to_string(),
            ));
        }

        let no_showings_agents = std::env::var("NO_SHOWINGS_AGENTS").unwrap_or_default();

        let rate_limit = RateLimitConfig {
            window_secs: parse_var("RATE_LIMIT_WINDOW_SECS", "900")?,
            max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", "100")?,
        };
        if rate_limit.window_secs == 0 || rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_WINDOW_SECS/RATE_LIMIT_MAX_REQUESTS".to_string(),
                "must both be greater than zero".to_string(),
            ));
        }
        let trust_proxy: bool = parse_var("TRUST_PROXY", "false")?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let insights_model =
            std::env::var("INSIGHTS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            session_ttl: Duration::hours(ttl_hours),
            no_showings_agents,
            rate_limit,
            trust_proxy,
            openai_api_key,
            insights_model,
        })
    }

    /// A configuration suitable for in-process use without a real environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: String::new(),
            log_level: Level::INFO,
            cors_origin: "http://localhost:3000".to_string(),
            session_ttl: Duration::hours(24),
            no_showings_agents: String::new(),
            rate_limit: RateLimitConfig {
                window_secs: 900,
                max_requests: 1000,
            },
            trust_proxy: false,
            openai_api_key: None,
            insights_model: "gpt-4o-mini".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_spreads_requests_over_the_window() {
        let cfg = RateLimitConfig {
            window_secs: 900,
            max_requests: 100,
        };
        assert_eq!(cfg.capacity(), 100.0);
        assert!((cfg.refill_per_sec() - 100.0 / 900.0).abs() < 1e-9);
    }

    #[test]
    fn bad_numbers_report_the_variable() {
        std::env::set_var("RATE_LIMIT_MAX_REQUESTS_PARSE_TEST", "many");
        let err = parse_var::<u32>("RATE_LIMIT_MAX_REQUESTS_PARSE_TEST", "1").unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_MAX_REQUESTS_PARSE_TEST"));
        std::env::remove_var("RATE_LIMIT_MAX_REQUESTS_PARSE_TEST");
    }
}
