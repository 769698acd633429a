//! In-process provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::{PersistenceProvider, StoreError, record_id};
use crate::entity::{EntityId, Record};

/// Records kept in a map. `set_failing(true)` makes every call fail with
/// `StoreError::Unavailable` until switched back.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<EntityId, Record>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with records, keyed by their `"Id"` field.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Result<Self, StoreError> {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record_id(&record)?, record);
            }
        }
        Ok(store)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is failing".into()));
        }
        Ok(())
    }
}

impl PersistenceProvider for MemoryStore {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        self.check()?;
        let id = record_id(record)?;
        let mut records = self.records.write();
        if records.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        records.insert(id, record.clone());
        Ok(())
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        self.check()?;
        let id = record_id(record)?;
        match self.records.write().get_mut(&id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(id)),
        }
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::Missing(id))
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        self.check()?;
        Ok(self.records.read().get(&id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        self.check()?;
        Ok(self.records.read().values().cloned().collect())
    }
}
