//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if ENTCACHE_CONFIG_FILE set)
//! 3. Environment variables (ENTCACHE_*)

use std::fmt;
use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::InitMode;

mod validation;

pub use validation::ConfigError;

/// Which persistence provider backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Lines,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => f.write_str("sqlite"),
            StoreBackend::Lines => f.write_str("lines"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persistence provider to use.
    ///
    /// Set via ENTCACHE_BACKEND environment variable.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to the SQLite database.
    ///
    /// Set via ENTCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Path to the line-per-record text file.
    ///
    /// Set via ENTCACHE_LINES_PATH environment variable.
    #[serde(default = "default_lines_path")]
    pub lines_path: PathBuf,

    /// Eager or lazy population of the cache.
    ///
    /// Set via ENTCACHE_INIT_MODE environment variable.
    #[serde(default)]
    pub init_mode: InitMode,

    /// Emit logs as JSON lines instead of human-readable text.
    ///
    /// Set via ENTCACHE_LOG_JSON environment variable.
    #[serde(default)]
    pub log_json: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./entcache.sqlite")
}

fn default_lines_path() -> PathBuf {
    PathBuf::from("./entcache-records.txt")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: default_db_path(),
            lines_path: default_lines_path(),
            init_mode: InitMode::default(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment can't be parsed, or
    /// if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ENTCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ENTCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Load from a TOML string layered over the defaults. Environment is ignored.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
