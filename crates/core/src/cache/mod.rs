//! Read-through, write-through entity cache.
//!
//! [`Cache`] keeps an in-memory index of entities in step with a
//! [`PersistenceProvider`]:
//!
//! - Mutations go to the provider first; the index changes only after the
//!   provider confirms, so a failed write leaves no trace
//! - One reader/writer lock guards the index. `get` shares it, `init`,
//!   `add`, `update` and `remove` hold it exclusively for the whole
//!   operation, provider round-trip and notification included
//! - Observers are called synchronously, in registration order, before the
//!   mutating call returns
//!
//! Observers run while the exclusive lock is held. Calling back into the
//! same cache from an observer deadlocks.

mod events;

#[cfg(test)]
mod tests;

pub use events::{CacheEvent, CacheOperation, SubscriptionId};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::entity::{Entity, EntityId};
use crate::error::StoreError;
use crate::store::PersistenceProvider;
use crate::translate::RecordTranslator;
use events::Observers;

/// How the index is populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    /// Load everything in `init()`; afterwards the index is authoritative.
    #[default]
    Eager,
    /// Start empty and fetch from the provider on a lookup miss.
    Lazy,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMode::Eager => f.write_str("eager"),
            InitMode::Lazy => f.write_str("lazy"),
        }
    }
}

#[derive(Debug)]
struct CacheState<E> {
    initialized: bool,
    index: HashMap<EntityId, E>,
}

/// Entity cache over a persistence provider.
///
/// Share it between threads behind an `Arc`; every operation takes `&self`.
pub struct Cache<E, P, T> {
    provider: P,
    translator: T,
    mode: InitMode,
    state: RwLock<CacheState<E>>,
    observers: Observers,
}

impl<E, P, T> Cache<E, P, T>
where
    E: Entity,
    P: PersistenceProvider,
    T: RecordTranslator<E>,
{
    /// Create an eager cache. Call [`Cache::init`] before anything else.
    pub fn new(provider: P, translator: T) -> Self {
        Self::with_mode(provider, translator, InitMode::Eager)
    }

    pub fn with_mode(provider: P, translator: T, mode: InitMode) -> Self {
        Self {
            provider,
            translator,
            mode,
            state: RwLock::new(CacheState { initialized: false, index: HashMap::new() }),
            observers: Observers::default(),
        }
    }

    pub fn mode(&self) -> InitMode {
        self.mode
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Populate the index. Only the first successful call does any work.
    ///
    /// In eager mode every record is fetched and decoded. The new index is
    /// installed only if all of them decode, so a failed `init` leaves the
    /// cache empty and uninitialized.
    ///
    /// # Errors
    ///
    /// `Error::Load` if the provider can't list its records,
    /// `Error::InvalidRecord` if one doesn't decode or two share an id.
    pub fn init(&self) -> Result<(), Error> {
        let mut state = self.state.write();
        if state.initialized {
            return Ok(());
        }

        if self.mode == InitMode::Eager {
            let records = self.provider.get_all().map_err(Error::Load)?;
            let mut index = HashMap::with_capacity(records.len());
            for record in &records {
                let entity = self.translator.decode(record)?;
                let id = entity.id();
                if index.insert(id, entity).is_some() {
                    return Err(Error::InvalidRecord(format!("duplicate id {id} in store")));
                }
            }
            state.index = index;
        }

        state.initialized = true;
        tracing::info!(mode = %self.mode, entries = state.index.len(), "Cache initialized");
        Ok(())
    }

    /// Look up an entity.
    ///
    /// A lazy cache that misses fetches the record from the provider and
    /// keeps it. An eager cache never consults the provider here.
    ///
    /// # Errors
    ///
    /// `Error::NotInitialized` for an eager cache before `init`. A lazy miss
    /// can also fail with `Error::Load` or `Error::InvalidRecord`.
    pub fn get(&self, id: EntityId) -> Result<Option<E>, Error> {
        {
            let state = self.state.read();
            self.check_initialized(&state)?;
            if let Some(entity) = state.index.get(&id) {
                return Ok(Some(entity.clone()));
            }
            if self.mode == InitMode::Eager {
                return Ok(None);
            }
        }

        // Lazy miss. The fetch and insert happen under the exclusive lock so a
        // concurrent remove can't be undone by a stale read.
        let mut state = self.state.write();
        if let Some(entity) = state.index.get(&id) {
            return Ok(Some(entity.clone()));
        }
        let Some(record) = self.provider.get(id).map_err(Error::Load)? else {
            tracing::debug!(id, "Lazy lookup missed provider");
            return Ok(None);
        };
        let entity = self.translator.decode(&record)?;
        if entity.id() != id {
            return Err(Error::InvalidRecord(format!("provider returned id {} for {id}", entity.id())));
        }
        state.index.insert(id, entity.clone());
        tracing::debug!(id, "Lazily loaded entity");
        Ok(Some(entity))
    }

    /// Persist and cache a new entity.
    ///
    /// # Errors
    ///
    /// `Error::AlreadyExists` if the id is resolvable, `Error::Persistence`
    /// if the provider rejects the write.
    pub fn add(&self, entity: E) -> Result<(), Error> {
        let id = entity.id();
        let mut state = self.state.write();
        self.check_initialized(&state)?;
        if self.resolvable(&state, id)? {
            return Err(Error::AlreadyExists(id));
        }

        let record = self.translator.encode(&entity);
        self.provider
            .add(&record)
            .map_err(|source| persistence_failure(CacheOperation::Add, id, source))?;

        state.index.insert(id, entity);
        self.observers.notify(CacheEvent { operation: CacheOperation::Add, id });
        Ok(())
    }

    /// Persist and cache a new value for an existing id.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the id isn't resolvable, `Error::Persistence` if
    /// the provider rejects the write. The cached value is unchanged either way.
    pub fn update(&self, entity: E) -> Result<(), Error> {
        let id = entity.id();
        let mut state = self.state.write();
        self.check_initialized(&state)?;
        if !self.resolvable(&state, id)? {
            return Err(Error::NotFound(id));
        }

        let record = self.translator.encode(&entity);
        self.provider
            .update(&record)
            .map_err(|source| persistence_failure(CacheOperation::Update, id, source))?;

        state.index.insert(id, entity);
        self.observers.notify(CacheEvent { operation: CacheOperation::Update, id });
        Ok(())
    }

    /// Delete an entity from the provider and the index.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the id isn't resolvable, `Error::Persistence` if
    /// the provider fails to delete it.
    pub fn remove(&self, id: EntityId) -> Result<(), Error> {
        let mut state = self.state.write();
        self.check_initialized(&state)?;
        if !self.resolvable(&state, id)? {
            return Err(Error::NotFound(id));
        }

        self.provider
            .remove(id)
            .map_err(|source| persistence_failure(CacheOperation::Remove, id, source))?;

        state.index.remove(&id);
        self.observers.notify(CacheEvent { operation: CacheOperation::Remove, id });
        Ok(())
    }

    /// Cached entities sorted by id. Never consults the provider.
    pub fn entities(&self) -> Result<Vec<E>, Error> {
        let state = self.state.read();
        self.check_initialized(&state)?;
        let mut entities: Vec<E> = state.index.values().cloned().collect();
        entities.sort_by_key(|e| e.id());
        Ok(entities)
    }

    /// Whether the index holds `id`. Never consults the provider.
    pub fn contains(&self, id: EntityId) -> bool {
        self.state.read().index.contains_key(&id)
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Register an observer for change notifications.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(Arc::new(observer))
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn check_initialized(&self, state: &CacheState<E>) -> Result<(), Error> {
        if !state.initialized && self.mode == InitMode::Eager {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    /// An id is resolvable if it is indexed or, outside eager mode, stored.
    fn resolvable(&self, state: &CacheState<E>, id: EntityId) -> Result<bool, Error> {
        if state.index.contains_key(&id) {
            return Ok(true);
        }
        if self.mode == InitMode::Eager {
            return Ok(false);
        }
        Ok(self.provider.get(id).map_err(Error::Load)?.is_some())
    }
}

fn persistence_failure(operation: CacheOperation, id: EntityId, source: StoreError) -> Error {
    tracing::warn!(%operation, id, error = %source, "Provider rejected mutation; index unchanged");
    Error::Persistence { operation, id, source }
}

impl<E, P, T> fmt::Debug for Cache<E, P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Cache")
            .field("mode", &self.mode)
            .field("initialized", &state.initialized)
            .field("entries", &state.index.len())
            .field("observers", &self.observers)
            .finish()
    }
}
