//! Pomodoro sessions: records, the reconciling engine, and calendar mirrors.

mod engine;
pub mod mirror;
mod session;

pub use engine::{PomodoroEngine, SessionAction, SessionReport, StatusReport, StopState};
pub use session::{BreakKind, PomodoroSession, Progress, SessionPhase, SessionSettings};
