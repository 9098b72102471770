//! DDL for the derived (normalized) tables.
//!
//! These tables are a pure function of the raw `substitutions` table and are
//! never migrated: each normalization run drops and recreates them.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;

/// Drop order matters while `foreign_keys` is on: link tables first.
const DROP_DERIVED: &str = "
DROP TABLE IF EXISTS entry_class;
DROP TABLE IF EXISTS substitution_entry;
DROP TABLE IF EXISTS message;
DROP TABLE IF EXISTS teacher;
DROP TABLE IF EXISTS room;
DROP TABLE IF EXISTS class;
DROP TABLE IF EXISTS subject;
";

const CREATE_DERIVED: &str = "
CREATE TABLE teacher (
    id   INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE room (
    id   INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE class (
    id   INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE subject (
    id   INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE substitution_entry (
    id                INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    substitution_id   INTEGER NOT NULL REFERENCES substitutions(id) ON DELETE CASCADE,
    row_index         INTEGER NOT NULL,

    group_label       TEXT,
    period_raw        TEXT,
    period_start      INTEGER,
    period_end        INTEGER,
    time_start        TEXT,
    time_end          TEXT,
    subject_raw       TEXT,
    info_flag         TEXT,
    comment           TEXT,

    is_cancelled      INTEGER NOT NULL DEFAULT 0,
    is_room_change    INTEGER NOT NULL DEFAULT 0,
    is_teacher_change INTEGER NOT NULL DEFAULT 0,

    room_new_id       INTEGER REFERENCES room(id),
    room_old_id       INTEGER REFERENCES room(id),
    teacher_new_id    INTEGER REFERENCES teacher(id),
    teacher_absent_id INTEGER REFERENCES teacher(id),

    CHECK (period_start IS NULL OR period_end IS NULL OR period_start <= period_end)
);

CREATE UNIQUE INDEX idx_substitution_entry_day_row
    ON substitution_entry (substitution_id, row_index);

CREATE TABLE entry_class (
    entry_id INTEGER NOT NULL REFERENCES substitution_entry(id) ON DELETE CASCADE,
    class_id INTEGER NOT NULL REFERENCES class(id),
    PRIMARY KEY (entry_id, class_id)
);

CREATE TABLE message (
    id              INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    substitution_id INTEGER NOT NULL REFERENCES substitutions(id) ON DELETE CASCADE,
    message_index   INTEGER NOT NULL,
    text            TEXT
);
";

/// Drop every derived table and recreate it empty.
pub fn reset_derived_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(DROP_DERIVED)?;
    conn.batch_execute(CREATE_DERIVED)
}

/// Open a connection with foreign key enforcement switched on.
///
/// The pragma is per-connection in SQLite and silently ignored inside a
/// transaction, so it has to run right after establishing.
pub fn establish(database_url: &str) -> ConnectionResult<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    conn.batch_execute("PRAGMA foreign_keys = ON;")
        .map_err(ConnectionError::CouldntSetupConfiguration)?;
    Ok(conn)
}
