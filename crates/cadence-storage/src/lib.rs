//! Cadence storage crate - SQLite-backed action ledger.
//!
//! Provides a WAL-mode SQLite database with in-place schema evolution, the
//! append-only [`ActionLedger`] and read-only reporting queries.

pub mod db;
pub mod ledger;
pub mod migrations;
pub mod queries;

pub use db::Database;
pub use ledger::ActionLedger;
pub use queries::{DailyCount, ErrorRow, QueryService, TagCount};
