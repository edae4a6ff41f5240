//! Append-only action ledger.
//!
//! Every attempted action lands here exactly once. The ledger answers the
//! dedup question ("was this item already liked?") before each attempt and
//! the aggregate counts shown by reporting tools.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::SecondsFormat;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use cadence_core::error::CadenceError;
use cadence_core::types::{ActionKind, ActionRecord};

use crate::db::Database;

/// Durable record of every attempted action.
#[derive(Debug, Clone)]
pub struct ActionLedger {
    db: Arc<Database>,
}

impl ActionLedger {
    /// Open (or create) the ledger stored at `path`.
    pub fn open(path: &Path) -> Result<Self, CadenceError> {
        Ok(Self::from_database(Arc::new(Database::new(path)?)))
    }

    /// Ledger backed by an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, CadenceError> {
        Ok(Self::from_database(Arc::new(Database::in_memory()?)))
    }

    pub fn from_database(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Shared handle to the underlying store, for reporting queries.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Append one record. The row is committed before this returns.
    ///
    /// Returns the row id assigned by the store.
    pub fn record_action(&self, record: &ActionRecord) -> Result<i64, CadenceError> {
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO actions
                    (timestamp, action_type, target_id, topic_tag,
                     comment_text, error_detail, content_link)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                    record.kind.as_str(),
                    record.target_id,
                    record.topic_tag,
                    record.comment_text,
                    record.error_detail,
                    record.content_link,
                ],
            )
            .map_err(|e| CadenceError::Storage(format!("Failed to record action: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(
            row_id = id,
            kind = %record.kind,
            target_id = record.target_id.as_deref().unwrap_or(""),
            "Action recorded"
        );
        Ok(id)
    }

    /// True iff a record of `kind` exists for `target_id`.
    pub fn has_action(&self, target_id: &str, kind: ActionKind) -> Result<bool, CadenceError> {
        self.db.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM actions WHERE target_id = ?1 AND action_type = ?2 LIMIT 1",
                    params![target_id, kind.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CadenceError::Storage(format!("Dedup lookup failed: {}", e)))?;
            Ok(found.is_some())
        })
    }

    /// Count of records per action kind, read from storage.
    pub fn get_stats(&self) -> Result<BTreeMap<ActionKind, u64>, CadenceError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT action_type, COUNT(*) FROM actions GROUP BY action_type")
                .map_err(|e| CadenceError::Storage(format!("Stats query prepare: {}", e)))?;

            let rows = stmt
                .query_map([], |row| {
                    let kind: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((kind, count))
                })
                .map_err(|e| CadenceError::Storage(format!("Stats query: {}", e)))?;

            let mut stats = BTreeMap::new();
            for row in rows {
                let (kind, count) = row.map_err(|e| CadenceError::Storage(e.to_string()))?;
                match kind.parse::<ActionKind>() {
                    Ok(kind) => {
                        stats.insert(kind, count as u64);
                    }
                    Err(e) => warn!(error = %e, "Ignoring unknown action type in ledger"),
                }
            }
            Ok(stats)
        })
    }

    /// Release the store. Other handles obtained through [`Self::database`]
    /// keep it open until they are dropped.
    pub fn close(self) -> Result<(), CadenceError> {
        match Arc::try_unwrap(self.db) {
            Ok(db) => db.close(),
            Err(_) => {
                debug!("Ledger closed while reporting handles remain open");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::CandidateItem;
    use chrono::{TimeZone, Utc};

    fn candidate(id: &str) -> CandidateItem {
        CandidateItem {
            id: id.to_string(),
            topic_tag: "books".to_string(),
            author_id: "7".to_string(),
            permalink: format!("https://example.com/p/{}", id),
            ..CandidateItem::default()
        }
    }

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_record_then_has_action() {
        let ledger = ActionLedger::in_memory().unwrap();
        let c = candidate("a");
        assert!(!ledger.has_action("a", ActionKind::Like).unwrap());

        ledger.record_action(&ActionRecord::like(at(9), &c)).unwrap();

        assert!(ledger.has_action("a", ActionKind::Like).unwrap());
        assert!(!ledger.has_action("a", ActionKind::Comment).unwrap());
        assert!(!ledger.has_action("b", ActionKind::Like).unwrap());
    }

    #[test]
    fn test_error_record_does_not_count_as_success() {
        let ledger = ActionLedger::in_memory().unwrap();
        let c = candidate("a");
        ledger
            .record_action(&ActionRecord::error(at(9), &c, "feedback_required"))
            .unwrap();
        assert!(!ledger.has_action("a", ActionKind::Like).unwrap());
        assert!(!ledger.has_action("a", ActionKind::Comment).unwrap());
    }

    #[test]
    fn test_row_ids_are_monotonic() {
        let ledger = ActionLedger::in_memory().unwrap();
        let first = ledger
            .record_action(&ActionRecord::like(at(9), &candidate("a")))
            .unwrap();
        let second = ledger
            .record_action(&ActionRecord::like(at(10), &candidate("b")))
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_stats_group_by_kind() {
        let ledger = ActionLedger::in_memory().unwrap();
        assert!(ledger.get_stats().unwrap().is_empty());

        ledger.record_action(&ActionRecord::like(at(9), &candidate("a"))).unwrap();
        ledger.record_action(&ActionRecord::like(at(9), &candidate("b"))).unwrap();
        ledger
            .record_action(&ActionRecord::comment(at(10), &candidate("a"), "Nice!".to_string()))
            .unwrap();
        ledger
            .record_action(&ActionRecord::untargeted_error(at(11), Some("books"), "timeout"))
            .unwrap();

        let stats = ledger.get_stats().unwrap();
        assert_eq!(stats.get(&ActionKind::Like), Some(&2));
        assert_eq!(stats.get(&ActionKind::Comment), Some(&1));
        assert_eq!(stats.get(&ActionKind::Error), Some(&1));
    }

    #[test]
    fn test_record_persists_all_fields() {
        let ledger = ActionLedger::in_memory().unwrap();
        let c = candidate("x");
        ledger
            .record_action(&ActionRecord::comment(at(12), &c, "So good".to_string()))
            .unwrap();

        let row: (String, String, Option<String>, Option<String>, Option<String>) = ledger
            .database()
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT timestamp, action_type, topic_tag, comment_text, content_link
                     FROM actions WHERE target_id = 'x'",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .map_err(|e| CadenceError::Storage(e.to_string()))
            })
            .unwrap();

        assert_eq!(row.0, "2026-04-02T12:00:00.000000Z");
        assert_eq!(row.1, "comment");
        assert_eq!(row.2.as_deref(), Some("books"));
        assert_eq!(row.3.as_deref(), Some("So good"));
        assert_eq!(row.4.as_deref(), Some("https://example.com/p/x"));
    }

    #[test]
    fn test_concurrent_reader_sees_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let writer = ActionLedger::open(&path).unwrap();
        let reader = ActionLedger::open(&path).unwrap();

        writer.record_action(&ActionRecord::like(at(9), &candidate("a"))).unwrap();
        assert_eq!(reader.get_stats().unwrap().get(&ActionKind::Like), Some(&1));
        assert!(reader.has_action("a", ActionKind::Like).unwrap());

        writer.record_action(&ActionRecord::like(at(10), &candidate("b"))).unwrap();
        assert_eq!(reader.get_stats().unwrap().get(&ActionKind::Like), Some(&2));

        writer.close().unwrap();
        reader.close().unwrap();
    }

    #[test]
    fn test_close_with_outstanding_handle() {
        let ledger = ActionLedger::in_memory().unwrap();
        let handle = ledger.database();
        ledger.close().unwrap();
        // The reporting handle still works.
        handle.with_conn(|_| Ok(())).unwrap();
    }
}
