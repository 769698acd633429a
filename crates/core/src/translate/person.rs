//! The bundled `Person` entity.

use serde::{Deserialize, Serialize};

use super::RecordTranslator;
use crate::Error;
use crate::entity::{Entity, EntityId, Record};

const NAME_FIELD: &str = "Name";
const AGE_FIELD: &str = "Age";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: EntityId,
    pub name: String,
    pub age: u32,
}

impl Person {
    pub fn new(id: EntityId, name: impl Into<String>, age: u32) -> Self {
        Self { id, name: name.into(), age }
    }
}

impl Entity for Person {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Maps `Person` to `{Id, Name, Age}` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonTranslator;

impl RecordTranslator<Person> for PersonTranslator {
    fn decode(&self, record: &Record) -> Result<Person, Error> {
        let id = record.id()?;
        let name = record.require(NAME_FIELD)?.to_string();
        let age = record.require(AGE_FIELD)?;
        let age = age
            .trim()
            .parse()
            .map_err(|_| Error::InvalidRecord(format!("Age is not a number: {age:?}")))?;
        Ok(Person { id, name, age })
    }

    fn encode(&self, person: &Person) -> Record {
        let mut record = Record::with_id(person.id);
        record.insert(NAME_FIELD, person.name.clone());
        record.insert(AGE_FIELD, person.age.to_string());
        record
    }
}
