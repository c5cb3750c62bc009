//! Database schema migrations for pomocal.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(tx: &rusqlite::Transaction<'_>, version: i32) -> SqliteResult<()> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: events and Pomodoro sessions.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id              TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            start_at        TEXT NOT NULL,
            end_at          TEXT NOT NULL,
            is_deadline     INTEGER NOT NULL DEFAULT 0,
            description     TEXT NOT NULL DEFAULT '',
            owner_id        TEXT NOT NULL,
            invited         TEXT NOT NULL DEFAULT '[]',
            color           TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'active',
            repetition      TEXT NOT NULL DEFAULT 'no-repetition',
            end_repetition  TEXT,
            cheated         INTEGER NOT NULL DEFAULT 0,
            parent_event_id TEXT REFERENCES events(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS pomodoro_sessions (
            id                       TEXT PRIMARY KEY,
            owner_id                 TEXT NOT NULL,
            start_time               TEXT NOT NULL,
            paused_time              TEXT,
            interval_time            TEXT,
            total_paused_secs        INTEGER NOT NULL DEFAULT 0,
            duration_minutes         INTEGER NOT NULL,
            break_minutes            INTEGER NOT NULL,
            long_break_minutes       INTEGER NOT NULL,
            cycles_before_long_break INTEGER NOT NULL,
            total_cycles             INTEGER NOT NULL,
            cycle                    INTEGER NOT NULL DEFAULT 1,
            completed                INTEGER NOT NULL DEFAULT 0,
            end_time                 TEXT,
            cheated                  INTEGER NOT NULL DEFAULT 0,
            checked                  INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_owner ON events(owner_id);
        CREATE INDEX IF NOT EXISTS idx_events_parent ON events(parent_event_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_owner_start ON pomodoro_sessions(owner_id, start_time);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: link mirrored calendar events to their Pomodoro session.
///
/// Adds `events.session_id`, which replaces looking mirrors up by title and
/// color.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_session_id: bool = tx.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('events') WHERE name = 'session_id'",
        [],
        |row| row.get::<_, i32>(0),
    )? > 0;

    if !has_session_id {
        tx.execute_batch("ALTER TABLE events ADD COLUMN session_id TEXT;")?;
    }
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
         CREATE INDEX IF NOT EXISTS idx_events_owner_end ON events(owner_id, end_at);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}
