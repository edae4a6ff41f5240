//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode so a second process (or a second `Database` on the
//! same file) can read while the engine appends.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use cadence_core::error::CadenceError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, synchronous=FULL so every committed append is
    /// durable, and brings the schema up to date.
    pub fn new(path: &Path) -> Result<Self, CadenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| CadenceError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| CadenceError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::ensure_schema)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, CadenceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CadenceError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::ensure_schema)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CadenceError>
    where
        F: FnOnce(&Connection) -> Result<T, CadenceError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CadenceError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Close the connection, flushing the WAL.
    pub fn close(self) -> Result<(), CadenceError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| CadenceError::Storage(format!("Database lock poisoned: {}", e)))?;
        conn.close()
            .map_err(|(_, e)| CadenceError::Storage(format!("Failed to close database: {}", e)))?;
        debug!("Database closed");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_actions(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM actions", [], |row| row.get(0))
                .map_err(|e| CadenceError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count_actions(&db), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        let db = Database::new(&path).unwrap();
        assert_eq!(count_actions(&db), 0);
        assert!(path.exists());
        db.close().unwrap();
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| CadenceError::Storage(e.to_string()))?;
            assert_eq!(mode, "wal");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");

        let db = Database::new(&path).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO actions (timestamp, action_type, target_id)
                 VALUES ('2026-01-01T10:00:00Z', 'like', 'a')",
                [],
            )
            .map_err(|e| CadenceError::Storage(e.to_string()))?;
            Ok(())
        })
        .unwrap();
        db.close().unwrap();

        let db = Database::new(&path).unwrap();
        assert_eq!(count_actions(&db), 1);
    }
}
