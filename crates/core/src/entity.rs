//! Entity identity and the flat record form exchanged with providers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identity of an entity. Unique across everything a cache can see.
pub type EntityId = u64;

/// A value the cache can hold.
///
/// The id must stay the same for the lifetime of the value; updates replace
/// the whole value under the same id.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> EntityId;
}

/// Field name to string value mapping, the wire form of an entity.
///
/// Every record handed to a provider carries an `"Id"` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub const ID_FIELD: &'static str = "Id";

    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding only the id field.
    pub fn with_id(id: EntityId) -> Self {
        let mut record = Self::new();
        record.insert(Self::ID_FIELD, id.to_string());
        record
    }

    /// Parse the `"Id"` field.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRecord` if the field is missing or not a
    /// non-negative integer.
    pub fn id(&self) -> Result<EntityId, Error> {
        let raw = self
            .get(Self::ID_FIELD)
            .ok_or_else(|| Error::InvalidRecord("missing Id field".into()))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::InvalidRecord(format!("Id is not a valid identity: {raw:?}")))
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Look up a field that must be present.
    pub fn require(&self, field: &str) -> Result<&str, Error> {
        self.get(field)
            .ok_or_else(|| Error::InvalidRecord(format!("missing {field} field")))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}
