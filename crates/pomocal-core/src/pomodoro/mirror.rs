//! Calendar events mirroring Pomodoro sessions.
//!
//! Every session gets one deadline-style event when it starts. When the
//! session finishes, the event is turned into a completed, non-deadline entry
//! spanning the session. Mirrors are found through `Event::session_id`.
//!
//! Mirror maintenance is best-effort: a failed lookup or update is logged
//! and never fails the session operation that triggered it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::session::PomodoroSession;
use crate::calendar::{Event, EventStatus, Repetition};
use crate::storage::Database;

/// Reserved color of Pomodoro mirrors.
pub const POMODORO_COLOR: &str = "#FF6347";

pub fn mirror_title(session: &PomodoroSession) -> String {
    format!(
        "Pomodoro Session {}/{}",
        session.cycle, session.settings.total_cycles
    )
}

/// Build the mirror of a freshly started session.
pub fn mirror_event(session: &PomodoroSession) -> Event {
    Event {
        id: Uuid::new_v4().to_string(),
        title: mirror_title(session),
        start: session.start_time,
        end: session.start_time,
        is_deadline: true,
        description: format!(
            "Pomodoro session for {} minutes with {} minutes break",
            session.settings.duration_minutes,
            session.break_minutes()
        ),
        owner_id: session.owner_id.clone(),
        invited: Vec::new(),
        color: POMODORO_COLOR.to_string(),
        status: EventStatus::Active,
        repetition: Repetition::NoRepetition,
        end_repetition: None,
        cheated: session.cheated,
        parent_event: None,
        session_id: Some(session.id.clone()),
    }
}

/// Persist the mirror of a new session.
pub fn open_mirror(db: &Database, session: &PomodoroSession) -> Option<Event> {
    let event = mirror_event(session);
    match db.insert_event(&event) {
        Ok(()) => {
            tracing::debug!(session_id = %session.id, event_id = %event.id, "mirror event created");
            Some(event)
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "failed to create mirror event");
            None
        }
    }
}

/// Mark the mirror of a finished session as completed at `at`.
pub fn close_mirror(db: &Database, session: &PomodoroSession, at: DateTime<Utc>) {
    let mut event = match db.find_event_by_session(&session.id) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::warn!(session_id = %session.id, "no mirror event found for session");
            return;
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "mirror event lookup failed");
            return;
        }
    };

    event.end = at.max(event.start);
    event.is_deadline = false;
    event.status = EventStatus::Completed;
    event.cheated = event.cheated || session.cheated;

    if let Err(e) = db.update_event(&event) {
        tracing::warn!(session_id = %session.id, error = %e, "failed to update mirror event");
    }
}

/// Carry the session's cheated flag over to its mirror.
pub fn flag_mirror_cheated(db: &Database, session: &PomodoroSession) {
    match db.find_event_by_session(&session.id) {
        Ok(Some(mut event)) if !event.cheated => {
            event.cheated = true;
            if let Err(e) = db.update_event(&event) {
                tracing::warn!(session_id = %session.id, error = %e, "failed to flag mirror event");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "mirror event lookup failed");
        }
    }
}
