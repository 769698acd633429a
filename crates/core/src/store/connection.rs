//! SQLite connection management with pragma configuration.
//!
//! Opens the database, applies the pragmas needed for WAL-mode concurrency,
//! and runs migrations.

use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use tokio_rusqlite::rusqlite::Connection;

use super::{StoreError, migrations};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;
                       PRAGMA foreign_keys=ON;";

/// SQLite-backed provider handle.
///
/// The connection is not `Sync`, so calls take turns on a mutex.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::prepare(conn)?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");
        Ok(store)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(PRAGMAS)?;
        migrations::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
