//! Configuration with validation at startup.

use clap::{Parser, ValueEnum};

/// Deployment environment.
///
/// Controls how much diagnostic detail reaches logs and clients: outside
/// production, entry logs carry redacted header/body detail and error
/// envelopes carry the diagnostic chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// HTTP boundary service configuration.
///
/// All values can be set via environment variables or CLI arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "api-boundary", about = "HTTP service boundary layer")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "HTTP_ADDRESS", default_value = "0.0.0.0:3000")]
    pub http_address: String,

    /// Deployment environment
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value = "development")]
    pub environment: Environment,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Use JSON log format
    #[arg(long, env = "JSON_LOGS", default_value = "true")]
    pub json_logs: bool,

    /// Request timeout in seconds
    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Cap on request bodies buffered for logging, in bytes
    #[arg(long, env = "MAX_LOGGED_BODY_BYTES", default_value = "16384")]
    pub max_logged_body_bytes: usize,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Request timeout must be > 0")]
    InvalidRequestTimeout,
    #[error("Logged body cap must be > 0")]
    InvalidBodyCap,
}

impl Config {
    /// Parse and validate configuration.
    pub fn init() -> anyhow::Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout);
        }
        if self.max_logged_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyCap);
        }
        Ok(())
    }
}
