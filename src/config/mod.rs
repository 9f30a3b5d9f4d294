//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::game::court::{DEFAULT_COURT_HEIGHT, DEFAULT_COURT_WIDTH};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Court width in court-local pixels
    pub court_width: f32,
    /// Court height in court-local pixels
    pub court_height: f32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            court_width: parse_dimension("COURT_WIDTH", DEFAULT_COURT_WIDTH)?,
            court_height: parse_dimension("COURT_HEIGHT", DEFAULT_COURT_HEIGHT)?,
        })
    }
}

/// Parse an optional positive dimension override
fn parse_dimension(var: &'static str, default: f32) -> Result<f32, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or(ConfigError::InvalidDimension(var)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid court dimension in {0}: must be a positive number")]
    InvalidDimension(&'static str),
}
