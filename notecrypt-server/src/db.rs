//! SQLite connection shared by the profile and note stores.

use crate::error::{ServerError, ServerResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS encryption_profiles (
        account_id TEXT PRIMARY KEY,
        salt TEXT,
        stable_key TEXT,
        algorithm TEXT NOT NULL,
        version TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        created TEXT
    );

    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        document TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        is_archived INTEGER NOT NULL DEFAULT 0,
        last_modified_ms INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_notes_account
        ON notes(account_id, last_modified_ms DESC);

    CREATE TABLE IF NOT EXISTS note_history (
        note_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_history_note ON note_history(note_id, version DESC);
";

/// Handle to the service database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> ServerResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(ServerError::storage("failed to open database"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(ServerError::storage("failed to set busy timeout"))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> ServerResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(ServerError::storage("failed to open in-memory database"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> ServerResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(ServerError::storage("failed to initialize schema"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> ServerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServerError::Storage("database lock poisoned".to_string()))
    }
}
