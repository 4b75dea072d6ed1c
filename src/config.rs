//! Configuration management for the ledger node

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of the admission queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Relaxed validation: top up poor senders, tolerate nonce mismatches
    #[serde(default)]
    pub debug: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            debug: false,
        }
    }
}

fn default_db_path() -> String {
    "./ledger.db".to_string()
}

fn default_queue_size() -> usize {
    crate::mempool::TX_POOL_QUEUE_SIZE
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str).map_err(|e| {
            ChainError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.database.path.is_empty() {
            return Err(ChainError::ConfigError(
                "database.path must not be empty".to_string(),
            ));
        }

        if self.pool.queue_size == 0 {
            return Err(ChainError::ConfigError(
                "pool.queue_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
