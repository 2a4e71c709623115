//! Configuration management for the Pharmacy Retail ERP backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PERP_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Snapshot refresh configuration
    pub refresh: RefreshConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

/// Tuning for the snapshot refresh engine and its queue worker
#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    /// Items refreshed per committed chunk of a branch-wide job
    pub chunk_size: i64,

    /// Jobs claimed per worker drain cycle
    pub batch_limit: i64,

    /// Age in seconds after which a claim is considered stale
    pub stale_claim_secs: i64,

    /// Seconds between worker drain cycles
    pub worker_poll_secs: u64,

    /// Whether the embedded queue worker runs in this process
    pub worker_enabled: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("PERP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("refresh.chunk_size", 200)?
            .set_default("refresh.batch_limit", 50)?
            .set_default("refresh.stale_claim_secs", 3600)?
            .set_default("refresh.worker_poll_secs", 30)?
            .set_default("refresh.worker_enabled", true)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PERP_ prefix)
            .add_source(
                Environment::with_prefix("PERP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            batch_limit: 50,
            stale_claim_secs: 3600,
            worker_poll_secs: 30,
            worker_enabled: true,
        }
    }
}
