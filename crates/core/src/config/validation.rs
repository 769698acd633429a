//! Configuration validation rules.
//!
//! Checks `AppConfig` values after they have been loaded from environment,
//! files, or defaults.

use crate::cache::InitMode;
use crate::config::{AppConfig, StoreBackend};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the path for the selected backend
    /// is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StoreBackend::Sqlite if self.db_path.as_os_str().is_empty() => {
                return Err(ConfigError::Invalid {
                    field: "db_path".into(),
                    reason: "must not be empty with the sqlite backend".into(),
                });
            }
            StoreBackend::Lines if self.lines_path.as_os_str().is_empty() => {
                return Err(ConfigError::Invalid {
                    field: "lines_path".into(),
                    reason: "must not be empty with the lines backend".into(),
                });
            }
            _ => {}
        }

        if self.backend == StoreBackend::Memory && self.init_mode == InitMode::Lazy {
            tracing::warn!(
                backend = %self.backend,
                init_mode = %self.init_mode,
                "Lazy mode over a fresh memory store has nothing to load"
            );
        }

        Ok(())
    }
}
