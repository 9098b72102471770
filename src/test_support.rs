//! Shared helpers for tests that need a store.

use crate::db::derived::establish;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;

/// Fresh in-memory store with the raw-table migrations applied.
pub fn memory_connection() -> SqliteConnection {
    let mut conn = establish(":memory:").expect("in-memory sqlite");
    conn.run_pending_migrations(crate::MIGRATIONS).expect("migrations apply");
    conn
}

pub fn fetched_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 8)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .expect("valid timestamp")
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present")
}
