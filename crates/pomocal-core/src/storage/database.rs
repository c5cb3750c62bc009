//! SQLite-based storage for calendar events and Pomodoro sessions.
//!
//! Provides persistent storage for:
//! - Calendar events, including generated occurrences (`parent_event_id`)
//!   and Pomodoro mirrors (`session_id`)
//! - Pomodoro sessions, newest-first lookups per owner
//!
//! Timestamps are stored as RFC 3339 UTC with millisecond precision so that
//! `ORDER BY` on the text columns is chronological.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::calendar::{Event, EventStatus, Repetition};
use crate::error::{CoreError, DatabaseError};
use crate::pomodoro::{PomodoroSession, SessionSettings};

const EVENT_COLUMNS: &str = "id, title, start_at, end_at, is_deadline, description, owner_id, \
     invited, color, status, repetition, end_repetition, cheated, parent_event_id, session_id";

const SESSION_COLUMNS: &str = "id, owner_id, start_time, paused_time, interval_time, \
     total_paused_secs, duration_minutes, break_minutes, long_break_minutes, \
     cycles_before_long_break, total_cycles, cycle, completed, end_time, cheated, checked";

/// What a cheated-data purge removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub deleted_sessions: usize,
    pub deleted_events: usize,
}

// === Helper Functions ===

fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn invited_json(invited: &[String]) -> String {
    serde_json::to_string(invited).unwrap_or_else(|_| "[]".to_string())
}

fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let invited_raw: String = row.get(7)?;
    let invited: Vec<String> =
        serde_json::from_str(&invited_raw).map_err(|e| conversion_error(7, e))?;
    let status: String = row.get(9)?;
    let repetition: String = row.get(10)?;

    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        start: get_ts(row, 2)?,
        end: get_ts(row, 3)?,
        is_deadline: row.get(4)?,
        description: row.get(5)?,
        owner_id: row.get(6)?,
        invited,
        color: row.get(8)?,
        status: status
            .parse::<EventStatus>()
            .map_err(|e| conversion_error(9, e))?,
        repetition: repetition
            .parse::<Repetition>()
            .map_err(|e| conversion_error(10, e))?,
        end_repetition: get_opt_ts(row, 11)?,
        cheated: row.get(12)?,
        parent_event: row.get(13)?,
        session_id: row.get(14)?,
    })
}

fn row_to_session(row: &Row) -> rusqlite::Result<PomodoroSession> {
    Ok(PomodoroSession {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        start_time: get_ts(row, 2)?,
        paused_time: get_opt_ts(row, 3)?,
        interval_time: get_opt_ts(row, 4)?,
        total_paused_secs: row.get(5)?,
        settings: SessionSettings {
            duration_minutes: row.get(6)?,
            break_minutes: row.get(7)?,
            long_break_minutes: row.get(8)?,
            cycles_before_long_break: row.get(9)?,
            total_cycles: row.get(10)?,
        },
        cycle: row.get(11)?,
        completed: row.get(12)?,
        end_time: get_opt_ts(row, 13)?,
        cheated: row.get(14)?,
        checked: row.get(15)?,
    })
}

/// SQLite database for events and Pomodoro sessions.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/pomocal.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("pomocal.db");
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // === Events ===

    pub fn insert_event(&self, event: &Event) -> Result<(), rusqlite::Error> {
        insert_event_with(&self.conn, event)
    }

    /// Insert a batch of events in one transaction. Either all land or none do.
    pub fn insert_events(&self, events: &[Event]) -> Result<usize, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        for event in events {
            insert_event_with(&tx, event)?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    pub fn update_event(&self, event: &Event) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE events
             SET title = ?2, start_at = ?3, end_at = ?4, is_deadline = ?5, description = ?6,
                 owner_id = ?7, invited = ?8, color = ?9, status = ?10, repetition = ?11,
                 end_repetition = ?12, cheated = ?13, parent_event_id = ?14, session_id = ?15
             WHERE id = ?1",
            params![
                event.id,
                event.title,
                format_ts(&event.start),
                format_ts(&event.end),
                event.is_deadline,
                event.description,
                event.owner_id,
                invited_json(&event.invited),
                event.color,
                event.status.as_str(),
                event.repetition.as_str(),
                event.end_repetition.as_ref().map(format_ts),
                event.cheated,
                event.parent_event,
                event.session_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_event(&self, id: &str) -> Result<Option<Event>, rusqlite::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], row_to_event)
            .optional()
    }

    /// Events owned by `owner_id` or inviting `email`, ordered by start.
    pub fn list_events_for(&self, owner_id: &str, email: &str) -> Result<Vec<Event>, rusqlite::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1
                OR EXISTS (SELECT 1 FROM json_each(events.invited) WHERE json_each.value = ?2)
             ORDER BY start_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id, email], row_to_event)?;
        rows.collect()
    }

    /// Occurrences generated from a master, ordered by start.
    pub fn list_children(&self, master_id: &str) -> Result<Vec<Event>, rusqlite::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE parent_event_id = ?1 ORDER BY start_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![master_id], row_to_event)?;
        rows.collect()
    }

    pub fn delete_children(&self, master_id: &str) -> Result<usize, rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM events WHERE parent_event_id = ?1",
            params![master_id],
        )
    }

    /// Delete an event together with its occurrences in one transaction.
    ///
    /// Returns the number of rows removed.
    pub fn delete_event_cascade(&self, id: &str) -> Result<usize, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let children = tx.execute("DELETE FROM events WHERE parent_event_id = ?1", params![id])?;
        let own = tx.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(children + own)
    }

    /// The calendar event mirroring a Pomodoro session.
    pub fn find_event_by_session(&self, session_id: &str) -> Result<Option<Event>, rusqlite::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE session_id = ?1 LIMIT 1");
        self.conn
            .query_row(&sql, params![session_id], row_to_event)
            .optional()
    }

    /// Newest Pomodoro mirror of an owner, by end instant.
    pub fn latest_pomodoro_event(&self, owner_id: &str) -> Result<Option<Event>, rusqlite::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1 AND session_id IS NOT NULL
             ORDER BY end_at DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![owner_id], row_to_event)
            .optional()
    }

    // === Pomodoro sessions ===

    pub fn insert_session(&self, session: &PomodoroSession) -> Result<(), rusqlite::Error> {
        let sql = format!(
            "INSERT INTO pomodoro_sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        );
        self.conn.execute(
            &sql,
            params![
                session.id,
                session.owner_id,
                format_ts(&session.start_time),
                session.paused_time.as_ref().map(format_ts),
                session.interval_time.as_ref().map(format_ts),
                session.total_paused_secs,
                session.settings.duration_minutes,
                session.settings.break_minutes,
                session.settings.long_break_minutes,
                session.settings.cycles_before_long_break,
                session.settings.total_cycles,
                session.cycle,
                session.completed,
                session.end_time.as_ref().map(format_ts),
                session.cheated,
                session.checked,
            ],
        )?;
        Ok(())
    }

    pub fn update_session(&self, session: &PomodoroSession) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE pomodoro_sessions
             SET owner_id = ?2, start_time = ?3, paused_time = ?4, interval_time = ?5,
                 total_paused_secs = ?6, duration_minutes = ?7, break_minutes = ?8,
                 long_break_minutes = ?9, cycles_before_long_break = ?10, total_cycles = ?11,
                 cycle = ?12, completed = ?13, end_time = ?14, cheated = ?15, checked = ?16
             WHERE id = ?1",
            params![
                session.id,
                session.owner_id,
                format_ts(&session.start_time),
                session.paused_time.as_ref().map(format_ts),
                session.interval_time.as_ref().map(format_ts),
                session.total_paused_secs,
                session.settings.duration_minutes,
                session.settings.break_minutes,
                session.settings.long_break_minutes,
                session.settings.cycles_before_long_break,
                session.settings.total_cycles,
                session.cycle,
                session.completed,
                session.end_time.as_ref().map(format_ts),
                session.cheated,
                session.checked,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<PomodoroSession>, rusqlite::Error> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM pomodoro_sessions WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], row_to_session)
            .optional()
    }

    /// Newest uncompleted session of an owner.
    pub fn latest_active_session(
        &self,
        owner_id: &str,
    ) -> Result<Option<PomodoroSession>, rusqlite::Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE owner_id = ?1 AND completed = 0
             ORDER BY start_time DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![owner_id], row_to_session)
            .optional()
    }

    /// Newest session of an owner, finished or not.
    pub fn latest_session(&self, owner_id: &str) -> Result<Option<PomodoroSession>, rusqlite::Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE owner_id = ?1
             ORDER BY start_time DESC, cycle DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![owner_id], row_to_session)
            .optional()
    }

    /// Newest naturally completed, not yet chained session that still has
    /// cycles left.
    pub fn last_chainable_session(
        &self,
        owner_id: &str,
    ) -> Result<Option<PomodoroSession>, rusqlite::Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE owner_id = ?1
               AND completed = 1
               AND end_time IS NOT NULL
               AND interval_time IS NOT NULL
               AND checked = 0
               AND cycle < total_cycles
             ORDER BY end_time DESC LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![owner_id], row_to_session)
            .optional()
    }

    /// All sessions of an owner, oldest first.
    pub fn list_sessions(&self, owner_id: &str) -> Result<Vec<PomodoroSession>, rusqlite::Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pomodoro_sessions
             WHERE owner_id = ?1
             ORDER BY start_time ASC, cycle ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], row_to_session)?;
        rows.collect()
    }

    /// Delete an owner's cheated sessions, their mirrors, and any other
    /// cheated events of that owner, in one transaction.
    pub fn purge_cheated(&self, owner_id: &str) -> Result<PurgeSummary, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted_events = tx.execute(
            "DELETE FROM events
             WHERE owner_id = ?1
               AND (cheated = 1
                    OR session_id IN (SELECT id FROM pomodoro_sessions
                                      WHERE owner_id = ?1 AND cheated = 1))",
            params![owner_id],
        )?;
        let deleted_sessions = tx.execute(
            "DELETE FROM pomodoro_sessions WHERE owner_id = ?1 AND cheated = 1",
            params![owner_id],
        )?;
        tx.commit()?;
        Ok(PurgeSummary {
            deleted_sessions,
            deleted_events,
        })
    }
}

fn insert_event_with(conn: &Connection, event: &Event) -> Result<(), rusqlite::Error> {
    let sql = format!(
        "INSERT INTO events ({EVENT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
    );
    conn.execute(
        &sql,
        params![
            event.id,
            event.title,
            format_ts(&event.start),
            format_ts(&event.end),
            event.is_deadline,
            event.description,
            event.owner_id,
            invited_json(&event.invited),
            event.color,
            event.status.as_str(),
            event.repetition.as_str(),
            event.end_repetition.as_ref().map(format_ts),
            event.cheated,
            event.parent_event,
            event.session_id,
        ],
    )?;
    Ok(())
}
