//! Persistence providers.
//!
//! The cache only talks to durable storage through [`PersistenceProvider`].
//! Three providers ship with the crate:
//!
//! - [`SqliteStore`]: SQLite database, records stored as JSON, WAL mode
//! - [`LineFileStore`]: plain text file, line number is the id
//! - [`MemoryStore`]: in-process map with fault injection for tests

pub mod connection;
pub mod lines;
pub mod memory;
pub mod migrations;
pub mod records;

use std::sync::Arc;

pub use crate::error::StoreError;
use crate::entity::{EntityId, Record};

pub use connection::SqliteStore;
pub use lines::LineFileStore;
pub use memory::MemoryStore;

/// Durable keyed storage of records.
///
/// Implementations handle their own thread safety; the cache serializes its
/// own calls but other handles to the same provider may not.
pub trait PersistenceProvider: Send + Sync {
    /// Store a new record. The record carries its `"Id"` field.
    fn add(&self, record: &Record) -> Result<(), StoreError>;

    /// Replace the stored record with the same id.
    fn update(&self, record: &Record) -> Result<(), StoreError>;

    fn remove(&self, id: EntityId) -> Result<(), StoreError>;

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError>;

    /// Every stored record. Only used by eager initialization.
    fn get_all(&self) -> Result<Vec<Record>, StoreError>;
}

impl<P: PersistenceProvider + ?Sized> PersistenceProvider for Arc<P> {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        (**self).add(record)
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        (**self).remove(id)
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        (**self).get(id)
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        (**self).get_all()
    }
}

impl<P: PersistenceProvider + ?Sized> PersistenceProvider for Box<P> {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        (**self).add(record)
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        (**self).remove(id)
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        (**self).get(id)
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        (**self).get_all()
    }
}

/// Pull the id out of a record headed for a provider.
pub(crate) fn record_id(record: &Record) -> Result<EntityId, StoreError> {
    record.id().map_err(|e| StoreError::Rejected(e.to_string()))
}
