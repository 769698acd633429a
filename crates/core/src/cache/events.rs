//! Change notifications.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Kind of mutation a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOperation {
    Add,
    Update,
    Remove,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Add => "add",
            CacheOperation::Update => "update",
            CacheOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted after a mutation is confirmed by the provider.
///
/// Carries only the id; observers that need the value call `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEvent {
    pub operation: CacheOperation,
    pub id: EntityId,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op: {} id: {}", self.operation, self.id)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Registered observers in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    list: Mutex<Vec<(SubscriptionId, Observer)>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.list.lock().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.list.lock();
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.list.lock().len()
    }

    /// Call every observer with `event`.
    ///
    /// The list is copied first so observers may subscribe or unsubscribe
    /// while being notified; such changes apply from the next event on.
    pub(crate) fn notify(&self, event: CacheEvent) {
        let observers: Vec<Observer> = self.list.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            observer(&event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers").field("count", &self.len()).finish()
    }
}
