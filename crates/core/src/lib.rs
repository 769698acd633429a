//! Core types and shared functionality for entcache.
//!
//! This crate provides:
//! - A read-through/write-through entity cache with change notifications
//! - The persistence provider contract with SQLite, line-file and
//!   in-memory implementations
//! - The record translator contract and the bundled `Person` entity
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod store;
pub mod translate;

pub use cache::{Cache, CacheEvent, CacheOperation, InitMode, SubscriptionId};
pub use config::{AppConfig, ConfigError, StoreBackend};
pub use entity::{Entity, EntityId, Record};
pub use error::{Error, StoreError};
pub use store::{LineFileStore, MemoryStore, PersistenceProvider, SqliteStore};
pub use translate::{Person, PersonTranslator, RecordTranslator};
