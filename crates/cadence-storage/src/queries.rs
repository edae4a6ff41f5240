//! Reporting queries over the action ledger.
//!
//! Read-only views used by the `cadence` CLI: recent failures, per-day
//! activity and per-tag breakdowns.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Serialize;

use cadence_core::error::CadenceError;
use cadence_core::types::ActionKind;

use crate::db::Database;

/// One `error` row.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRow {
    pub timestamp: String,
    pub target_id: Option<String>,
    pub topic_tag: Option<String>,
    pub error_detail: Option<String>,
}

/// Count of one action kind on one UTC date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub kind: ActionKind,
    pub count: u64,
}

/// Count of one action kind under one topic tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub topic_tag: String,
    pub kind: ActionKind,
    pub count: u64,
}

/// Read-only query service over the ledger store.
pub struct QueryService {
    db: Arc<Database>,
}

impl QueryService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Most recent error rows, newest first.
    pub fn recent_errors(&self, limit: u64) -> Result<Vec<ErrorRow>, CadenceError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT timestamp, target_id, topic_tag, error_detail
                     FROM actions
                     WHERE action_type = 'error'
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(|e| CadenceError::Storage(format!("Errors query prepare: {}", e)))?;

            let rows = stmt
                .query_map(rusqlite::params![limit as i64], |row| {
                    Ok(ErrorRow {
                        timestamp: row.get(0)?,
                        target_id: row.get(1)?,
                        topic_tag: row.get(2)?,
                        error_detail: row.get(3)?,
                    })
                })
                .map_err(|e| CadenceError::Storage(format!("Errors query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| CadenceError::Storage(e.to_string()))?);
            }
            Ok(results)
        })
    }

    /// Per-date, per-kind counts for the last `days` days ending at `now`,
    /// oldest date first.
    pub fn daily_history(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyCount>, CadenceError> {
        let since = TimeDelta::try_days(i64::from(days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                CadenceError::Config(format!("history window of {} days is out of range", days))
            })?
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT substr(timestamp, 1, 10) AS day, action_type, COUNT(*)
                     FROM actions
                     WHERE timestamp >= ?1
                     GROUP BY day, action_type
                     ORDER BY day ASC, action_type ASC",
                )
                .map_err(|e| CadenceError::Storage(format!("History query prepare: {}", e)))?;

            let rows = stmt
                .query_map(rusqlite::params![since], |row| {
                    let day: String = row.get(0)?;
                    let kind: String = row.get(1)?;
                    let count: i64 = row.get(2)?;
                    Ok((day, kind, count))
                })
                .map_err(|e| CadenceError::Storage(format!("History query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                let (date, kind, count) = row.map_err(|e| CadenceError::Storage(e.to_string()))?;
                if let Ok(kind) = kind.parse::<ActionKind>() {
                    results.push(DailyCount {
                        date,
                        kind,
                        count: count as u64,
                    });
                }
            }
            Ok(results)
        })
    }

    /// Per-tag, per-kind counts, most active first.
    pub fn tag_stats(&self) -> Result<Vec<TagCount>, CadenceError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT topic_tag, action_type, COUNT(*) AS cnt
                     FROM actions
                     WHERE topic_tag IS NOT NULL
                     GROUP BY topic_tag, action_type
                     ORDER BY cnt DESC, topic_tag ASC, action_type ASC",
                )
                .map_err(|e| CadenceError::Storage(format!("Tag query prepare: {}", e)))?;

            let rows = stmt
                .query_map([], |row| {
                    let tag: String = row.get(0)?;
                    let kind: String = row.get(1)?;
                    let count: i64 = row.get(2)?;
                    Ok((tag, kind, count))
                })
                .map_err(|e| CadenceError::Storage(format!("Tag query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                let (topic_tag, kind, count) =
                    row.map_err(|e| CadenceError::Storage(e.to_string()))?;
                if let Ok(kind) = kind.parse::<ActionKind>() {
                    results.push(TagCount {
                        topic_tag,
                        kind,
                        count: count as u64,
                    });
                }
            }
            Ok(results)
        })
    }
}
