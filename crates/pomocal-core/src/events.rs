use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pomodoro::BreakKind;

/// Every Pomodoro state change produces a SessionEvent.
/// Engine operations return the events they caused alongside the new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: String,
        cycle: u32,
        total_cycles: u32,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: String,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: String,
        total_paused_secs: i64,
        at: DateTime<Utc>,
    },
    /// Study time is over; the break window opened.
    BreakStarted {
        session_id: String,
        cycle: u32,
        kind: BreakKind,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: String,
        cycle: u32,
        at: DateTime<Utc>,
    },
    SessionAborted {
        session_id: String,
        cycle: u32,
        at: DateTime<Utc>,
    },
    /// A chained session was synthesized after its predecessor elapsed.
    SuccessorStarted {
        session_id: String,
        predecessor_id: String,
        cycle: u32,
        at: DateTime<Utc>,
    },
    AllCyclesCompleted {
        total_cycles: u32,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::SessionStarted { at, .. }
            | SessionEvent::SessionPaused { at, .. }
            | SessionEvent::SessionResumed { at, .. }
            | SessionEvent::BreakStarted { at, .. }
            | SessionEvent::SessionCompleted { at, .. }
            | SessionEvent::SessionAborted { at, .. }
            | SessionEvent::SuccessorStarted { at, .. }
            | SessionEvent::AllCyclesCompleted { at, .. } => *at,
        }
    }
}
