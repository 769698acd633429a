//! Provider selection from configuration.

use anyhow::{Context, Result};
use entcache_core::{AppConfig, LineFileStore, MemoryStore, PersistenceProvider, SqliteStore, StoreBackend};

/// Open the provider named by `config.backend`.
pub fn open(config: &AppConfig) -> Result<Box<dyn PersistenceProvider>> {
    let provider: Box<dyn PersistenceProvider> = match config.backend {
        StoreBackend::Sqlite => Box::new(
            SqliteStore::open(&config.db_path)
                .with_context(|| format!("failed to open SQLite store at {}", config.db_path.display()))?,
        ),
        StoreBackend::Lines => Box::new(
            LineFileStore::open(&config.lines_path)
                .with_context(|| format!("failed to open line file at {}", config.lines_path.display()))?,
        ),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(provider)
}
