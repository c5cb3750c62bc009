//! Pomodoro session commands for CLI.
//!
//! Every command accepts `--at` to run against a simulated instant instead of
//! the wall clock. Sessions touched that way are flagged as cheated.

use clap::Subcommand;
use pomocal_core::{Database, PomodoroEngine, SessionAction, StopState, SystemClock};

use super::{parse_at, print_json, Context};

#[derive(Subcommand)]
pub enum PomodoroAction {
    /// Start a session (defaults come from the [pomodoro] config section)
    Start {
        /// Study minutes
        #[arg(long)]
        duration: Option<u32>,
        /// Short break minutes
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Long break minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Take a long break every N cycles
        #[arg(long)]
        cycles_before_long_break: Option<u32>,
        /// Cycles in the whole sequence
        #[arg(long)]
        total_cycles: Option<u32>,
        /// Simulated start instant
        #[arg(long)]
        at: Option<String>,
    },
    /// Pause a session
    Pause {
        /// Session ID
        id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Resume a paused session
    Resume {
        /// Session ID
        id: String,
        #[arg(long)]
        at: Option<String>,
    },
    /// Stop a session
    Stop {
        /// Session ID
        id: String,
        /// aborted, completed or interval
        #[arg(long)]
        state: StopState,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show the latest session, reconciled against now or --at
    Last {
        #[arg(long)]
        at: Option<String>,
        /// Flag reconciled sessions as cheated
        #[arg(long)]
        cheated: bool,
    },
    /// Show the current phase
    Status {
        #[arg(long)]
        at: Option<String>,
    },
    /// Delete all cheated sessions and events
    PurgeCheated,
}

pub fn run(ctx: &Context, action: PomodoroAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let clock = SystemClock;
    let engine = PomodoroEngine::new(&db, &clock);
    let actor = &ctx.actor;

    match action {
        PomodoroAction::Start {
            duration,
            break_minutes,
            long_break,
            cycles_before_long_break,
            total_cycles,
            at,
        } => {
            let mut settings = ctx.config.pomodoro.settings();
            if let Some(v) = duration {
                settings.duration_minutes = v;
            }
            if let Some(v) = break_minutes {
                settings.break_minutes = v;
            }
            if let Some(v) = long_break {
                settings.long_break_minutes = v;
            }
            if let Some(v) = cycles_before_long_break {
                settings.cycles_before_long_break = v;
            }
            if let Some(v) = total_cycles {
                settings.total_cycles = v;
            }
            let report = engine.start(actor, settings, parse_at(at.as_deref())?)?;
            print_json(&report)?;
        }
        PomodoroAction::Pause { id, at } => {
            let report = engine.apply(actor, &id, SessionAction::Pause, parse_at(at.as_deref())?)?;
            print_json(&report)?;
        }
        PomodoroAction::Resume { id, at } => {
            let report = engine.apply(actor, &id, SessionAction::Resume, parse_at(at.as_deref())?)?;
            print_json(&report)?;
        }
        PomodoroAction::Stop { id, state, at } => {
            let report = engine.apply(
                actor,
                &id,
                SessionAction::Stop(state),
                parse_at(at.as_deref())?,
            )?;
            print_json(&report)?;
        }
        PomodoroAction::Last { at, cheated } => {
            let report = engine.query_last(actor, parse_at(at.as_deref())?, cheated)?;
            print_json(&report)?;
        }
        PomodoroAction::Status { at } => {
            print_json(&engine.status(actor, parse_at(at.as_deref())?)?)?;
        }
        PomodoroAction::PurgeCheated => {
            print_json(&engine.purge_cheated(actor)?)?;
        }
    }
    Ok(())
}
