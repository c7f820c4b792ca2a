//! Application configuration loaded from environment variables.
//!
//! All configuration is loaded from environment variables with sensible
//! defaults. A `.env` file in the working directory is read first if present.
//!
//! # Variables
//!
//! - `HOST` / `PORT`: bind address (default: `0.0.0.0:8080`)
//! - `RPS_LIMIT`: limiter refill rate in tokens per second (default: 10)
//! - `RPS_BURST`: limiter capacity (default: 10)
//! - `IP_DB_CONFIG`: JSON lookup provider descriptor (required)
//! - `LOOKUP_TIMEOUT_MS`: per-request lookup budget (default: 2000)
//!
//! Logging is configured before this struct is loaded, so `ENVIRONMENT`
//! (see [`Environment::from_env`]) and `RUST_LOG` are read by the tracing
//! setup instead.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Deployment environment, selects the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Read `ENVIRONMENT`, defaulting to production when unset.
    pub fn from_env() -> Self {
        env::var("ENVIRONMENT")
            .map(|name| Self::from_name(&name))
            .unwrap_or_default()
    }

    /// Anything other than `development` (case-insensitive) is production.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("development") {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Tokens added to the global bucket per second (default: 10)
    pub rps_limit: u32,

    /// Bucket capacity, the largest admissible burst (default: 10)
    pub rps_burst: u32,

    // =========================================================================
    // Lookup Configuration
    // =========================================================================
    /// JSON provider descriptor, e.g.
    /// `{"dbtype":"csv","extra_details":{"file_path":"/data/ips.csv"}}`
    pub ip_db_config: String,

    /// Budget for a single lookup against an external store (default: 2s)
    pub lookup_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value cannot be parsed or fails
    /// validation (zero limits, missing `IP_DB_CONFIG`).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,

            // Rate limiting
            rps_limit: Self::parse_env("RPS_LIMIT", 10)?,
            rps_burst: Self::parse_env("RPS_BURST", 10)?,

            // Lookup
            ip_db_config: env::var("IP_DB_CONFIG").unwrap_or_default(),
            lookup_timeout: Duration::from_millis(Self::parse_env("LOOKUP_TIMEOUT_MS", 2000)?),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable.
    pub fn validate(&self) -> AppResult<()> {
        if self.rps_limit == 0 {
            return Err(AppError::Config(
                "RPS_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.rps_burst == 0 {
            return Err(AppError::Config(
                "RPS_BURST must be greater than 0".to_string(),
            ));
        }

        if self.lookup_timeout.is_zero() {
            return Err(AppError::Config(
                "LOOKUP_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.ip_db_config.trim().is_empty() {
            return Err(AppError::Config("IP_DB_CONFIG is required".to_string()));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Self::parse_value(name, env::var(name).ok().as_deref(), default)
    }

    fn parse_value<T>(name: &str, raw: Option<&str>, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match raw {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            rps_limit: 10,
            rps_burst: 10,
            ip_db_config: r#"{"dbtype":"csv","extra_details":{"file_path":"ip_locations.csv"}}"#
                .to_string(),
            lookup_timeout: Duration::from_millis(2000),
        }
    }
}
