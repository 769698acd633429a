//! Conversion between entities and records.

mod person;

pub use person::{Person, PersonTranslator};

use crate::Error;
use crate::entity::{Entity, Record};

/// Pure conversion between an entity and its record form.
///
/// `decode` must take the id from the record's `"Id"` field and `encode`
/// must write an `"Id"` field equal to `entity.id()`.
pub trait RecordTranslator<E: Entity>: Send + Sync {
    /// # Errors
    ///
    /// Returns `Error::InvalidRecord` when a required field is missing or
    /// malformed.
    fn decode(&self, record: &Record) -> Result<E, Error>;

    fn encode(&self, entity: &E) -> Record;
}

impl<E: Entity, T: RecordTranslator<E> + ?Sized> RecordTranslator<E> for Box<T> {
    fn decode(&self, record: &Record) -> Result<E, Error> {
        (**self).decode(record)
    }

    fn encode(&self, entity: &E) -> Record {
        (**self).encode(entity)
    }
}
