//! Unified error types for entcache.
//!
//! `Error` is what cache callers match on. `StoreError` is what persistence
//! providers report; the cache wraps it so the failing operation and id travel
//! with the provider's reason.

use tokio_rusqlite::rusqlite;

use crate::cache::CacheOperation;
use crate::entity::EntityId;

/// Errors returned by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An eager cache was used before `init()` completed.
    #[error("NOT_INITIALIZED: cache was set to eager but init() was not called")]
    NotInitialized,

    /// Add was called for an id that is already resolvable.
    #[error("ALREADY_EXISTS: entity {0} already exists, use update")]
    AlreadyExists(EntityId),

    /// Update or remove was called for an id that is not resolvable.
    #[error("NOT_FOUND: entity {0} does not exist")]
    NotFound(EntityId),

    /// The provider refused a durable mutation. The index was not touched.
    #[error("PERSISTENCE_FAILURE: {operation} of entity {id} failed: {source}")]
    Persistence {
        operation: CacheOperation,
        id: EntityId,
        #[source]
        source: StoreError,
    },

    /// The provider failed while the cache was reading from it.
    #[error("LOAD_FAILED: {0}")]
    Load(#[source] StoreError),

    /// A record could not be turned into an entity.
    #[error("INVALID_RECORD: {0}")]
    InvalidRecord(String),
}

/// Errors reported by persistence providers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this id is already stored.
    #[error("record {0} already stored")]
    Conflict(EntityId),

    /// No record with this id is stored.
    #[error("record {0} not stored")]
    Missing(EntityId),

    /// The record cannot be represented by this provider.
    #[error("record rejected: {0}")]
    Rejected(String),

    /// The provider is temporarily unable to serve requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be parsed back.
    #[error("stored data corrupt: {0}")]
    Corrupt(String),

    /// Schema migration failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
}
