//! Plain-text and JSON renderings of ledger reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use cadence_core::types::ActionKind;
use cadence_storage::{DailyCount, ErrorRow, TagCount};

const KINDS: [ActionKind; 3] = [ActionKind::Like, ActionKind::Comment, ActionKind::Error];

pub fn stats_text(stats: &BTreeMap<ActionKind, u64>) -> String {
    let mut out = String::new();
    let mut total = 0;
    for kind in KINDS {
        let count = stats.get(&kind).copied().unwrap_or(0);
        total += count;
        let _ = writeln!(out, "{:<8} {:>6}", kind.as_str(), count);
    }
    let _ = writeln!(out, "{:<8} {:>6}", "total", total);
    out
}

pub fn stats_json(stats: &BTreeMap<ActionKind, u64>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for kind in KINDS {
        let count = stats.get(&kind).copied().unwrap_or(0);
        map.insert(kind.as_str().to_string(), count.into());
    }
    map.insert("total".to_string(), stats.values().sum::<u64>().into());
    serde_json::Value::Object(map)
}

pub fn errors_text(rows: &[ErrorRow]) -> String {
    if rows.is_empty() {
        return "No errors recorded.\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{}  #{}  {}  {}",
            row.timestamp,
            row.topic_tag.as_deref().unwrap_or("-"),
            row.target_id.as_deref().unwrap_or("-"),
            row.error_detail.as_deref().unwrap_or("")
        );
    }
    out
}

/// One line per date with every kind's count.
pub fn history_text(rows: &[DailyCount]) -> String {
    if rows.is_empty() {
        return "No actions in this period.\n".to_string();
    }
    let mut by_date: BTreeMap<&str, BTreeMap<ActionKind, u64>> = BTreeMap::new();
    for row in rows {
        *by_date
            .entry(row.date.as_str())
            .or_default()
            .entry(row.kind)
            .or_default() += row.count;
    }

    let mut out = String::new();
    for (date, counts) in by_date {
        let _ = write!(out, "{}", date);
        for kind in KINDS {
            let _ = write!(out, "  {}={}", kind, counts.get(&kind).copied().unwrap_or(0));
        }
        out.push('\n');
    }
    out
}

/// Tags in the order returned by the query (most active first).
pub fn tags_text(rows: &[TagCount]) -> String {
    if rows.is_empty() {
        return "No tagged actions recorded.\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(out, "#{:<24} {:<8} {:>6}", row.topic_tag, row.kind.as_str(), row.count);
    }
    out
}
