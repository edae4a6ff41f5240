//! Schema setup and evolution.
//!
//! The ledger schema is a single append-only `actions` table. Stores created
//! by older releases may lack columns added since; those are added in place
//! with `ALTER TABLE ... ADD COLUMN`, which never touches existing rows.

use rusqlite::Connection;
use tracing::info;

use cadence_core::error::CadenceError;

/// Nullable columns that may be missing from stores created by older releases.
const OPTIONAL_COLUMNS: &[(&str, &str)] = &[("content_link", "TEXT")];

/// Create the ledger table if needed and add any missing optional columns.
pub fn ensure_schema(conn: &Connection) -> Result<(), CadenceError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS actions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp       TEXT NOT NULL,
            action_type     TEXT NOT NULL
                            CHECK (action_type IN ('like', 'comment', 'error')),
            target_id       TEXT,
            topic_tag       TEXT,
            comment_text    TEXT,
            error_detail    TEXT,
            content_link    TEXT
        );",
    )
    .map_err(|e| CadenceError::Storage(format!("Failed to create actions table: {}", e)))?;

    let existing = column_names(conn, "actions")?;
    for (name, sql_type) in OPTIONAL_COLUMNS {
        if !existing.iter().any(|c| c == name) {
            conn.execute_batch(&format!(
                "ALTER TABLE actions ADD COLUMN {} {};",
                name, sql_type
            ))
            .map_err(|e| CadenceError::Storage(format!("Failed to add column {}: {}", name, e)))?;
            info!(column = name, "Added missing ledger column");
        }
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_actions_target
            ON actions (target_id, action_type);

        CREATE INDEX IF NOT EXISTS idx_actions_timestamp
            ON actions (timestamp);",
    )
    .map_err(|e| CadenceError::Storage(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>, CadenceError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| CadenceError::Storage(format!("table_info prepare: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| CadenceError::Storage(format!("table_info query: {}", e)))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|e| CadenceError::Storage(e.to_string()))?);
    }
    Ok(names)
}
