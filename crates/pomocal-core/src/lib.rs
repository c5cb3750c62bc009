//! # Pomocal Core Library
//!
//! Core logic for a personal calendar with a Pomodoro session engine. Every
//! operation is available through the `pomocal` CLI binary, which is a thin
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Calendar**: events, deadlines, and recurrence expansion of repeating
//!   masters into stored child occurrences
//! - **Pomodoro Engine**: a timestamp-driven session state machine. There is no
//!   background timer; each query reconciles the stored session against "now"
//!   (or a simulated instant) and chains successor cycles as needed
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`EventService`]: create, edit, delete, list and complete events
//! - [`PomodoroEngine`]: start, pause, resume, stop and query sessions
//! - [`Database`]: event and session persistence
//! - [`Config`]: application configuration management
//! - [`Clock`]: the source of "now", replaceable in tests

pub mod actor;
pub mod calendar;
pub mod clock;
pub mod error;
pub mod events;
pub mod pomodoro;
pub mod storage;

pub use actor::Actor;
pub use calendar::{Event, EventDraft, EventService, EventStatus, Repetition};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::SessionEvent;
pub use pomodoro::{
    PomodoroEngine, PomodoroSession, SessionAction, SessionPhase, SessionReport, SessionSettings,
    StatusReport, StopState,
};
pub use storage::{Config, Database, PurgeSummary};
