//! Record CRUD on the SQLite store.
//!
//! Fields other than `"Id"` are stored as a JSON object; the id lives in
//! its own integer primary key column.

use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::connection::SqliteStore;
use super::{PersistenceProvider, StoreError, record_id};
use crate::entity::{EntityId, Record};

fn row_key(id: EntityId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Rejected(format!("id {id} exceeds SQLite integer range")))
}

fn encode_fields(record: &Record) -> Result<(i64, String), StoreError> {
    let id = row_key(record_id(record)?)?;
    let mut fields = record.clone();
    fields.remove(Record::ID_FIELD);
    let json = serde_json::to_string(&fields).map_err(|e| StoreError::Rejected(e.to_string()))?;
    Ok((id, json))
}

fn decode_row(id: i64, json: &str) -> Result<Record, StoreError> {
    let mut record: Record =
        serde_json::from_str(json).map_err(|e| StoreError::Corrupt(format!("record {id}: {e}")))?;
    record.insert(Record::ID_FIELD, id.to_string());
    Ok(record)
}

impl PersistenceProvider for SqliteStore {
    fn add(&self, record: &Record) -> Result<(), StoreError> {
        let (id, fields) = encode_fields(record)?;
        let result = self.conn().execute(
            "INSERT INTO records (id, fields, updated_at) VALUES (?1, ?2, ?3)",
            params![id, fields, chrono::Utc::now().to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Err(StoreError::Conflict(id as EntityId))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, record: &Record) -> Result<(), StoreError> {
        let (id, fields) = encode_fields(record)?;
        let changed = self.conn().execute(
            "UPDATE records SET fields = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, fields, chrono::Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing(id as EntityId));
        }
        Ok(())
    }

    fn remove(&self, id: EntityId) -> Result<(), StoreError> {
        let key = row_key(id)?;
        let changed = self.conn().execute("DELETE FROM records WHERE id = ?1", params![key])?;
        if changed == 0 {
            return Err(StoreError::Missing(id));
        }
        Ok(())
    }

    fn get(&self, id: EntityId) -> Result<Option<Record>, StoreError> {
        let Ok(key) = i64::try_from(id) else {
            return Ok(None);
        };
        let fields: Option<String> = self
            .conn()
            .query_row("SELECT fields FROM records WHERE id = ?1", params![key], |row| row.get(0))
            .optional()?;
        fields.map(|json| decode_row(key, &json)).transpose()
    }

    fn get_all(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, fields FROM records ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter().map(|(id, json)| decode_row(*id, json)).collect()
    }
}
