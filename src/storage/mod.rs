//! SQLite storage for the catalog and credential stores.

pub mod models;

use crate::error::DepotError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-safe handle over the embedded database.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn initialize_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS games (
                name TEXT PRIMARY KEY,
                source_b64 TEXT NOT NULL,
                downloads INTEGER NOT NULL DEFAULT 1,
                genres TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL,
                screenshots_url TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                rating TEXT NOT NULL DEFAULT '',
                platform TEXT NOT NULL DEFAULT '',
                added_at INTEGER NOT NULL,
                in_package_manager INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS accounts (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                hash_algorithm TEXT NOT NULL,
                rehash_count INTEGER NOT NULL,
                removable INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_games_source
                ON games(source_b64);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires
                ON sessions(expires_at);",
        )?;
        Ok(())
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, DepotError> {
        self.conn
            .lock()
            .map_err(|e| DepotError::Internal(format!("lock error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.db");

        let storage = Storage::open(&path).unwrap();
        {
            let conn = storage.conn().unwrap();
            let tables: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('games', 'accounts', 'sessions')",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(tables, 3);
        }
        drop(storage);

        // Reopening an existing database must not fail or clobber tables
        let reopened = Storage::open(&path).unwrap();
        reopened.conn().unwrap();
    }
}
