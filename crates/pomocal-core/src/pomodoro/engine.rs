//! Pomodoro session engine.
//!
//! A per-user state machine over stored [`PomodoroSession`] records. There is
//! no background timer: every operation reads the stored timestamps, works out
//! where the session stands at "now", and persists the result.
//!
//! ## State Transitions
//!
//! ```text
//! Ready -> Active -> Interval -> Active (next cycle) -> ... -> Completed
//!            |  ^        |  ^
//!            v  |        v  |
//!           Paused      Paused            (any open state) -> Aborted
//! ```
//!
//! "Now" comes from the injected [`Clock`] unless the request carries a
//! time-machine date. Querying with a simulated date far in the future walks
//! the whole chain forward: each elapsed session is finalized and its
//! successor synthesized, up to `total_cycles`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mirror;
use super::session::{PomodoroSession, Progress, SessionPhase, SessionSettings};
use crate::actor::Actor;
use crate::clock::{self, Clock};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::SessionEvent;
use crate::storage::{Database, PurgeSummary};

/// How a `stop` ends the current interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopState {
    /// Cancelled by the user; no end time is recorded.
    Aborted,
    Completed,
    /// Study is over and the break begins.
    Interval,
}

impl FromStr for StopState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aborted" => Ok(StopState::Aborted),
            "completed" => Ok(StopState::Completed),
            "interval" => Ok(StopState::Interval),
            other => Err(ValidationError::InvalidValue {
                field: "state".into(),
                message: format!("expected aborted, completed or interval, got '{other}'"),
            }),
        }
    }
}

/// An action on an existing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Pause,
    Resume,
    Stop(StopState),
}

impl SessionAction {
    /// Parse an action name plus the optional `state` that `stop` needs.
    pub fn parse(action: &str, state: Option<&str>) -> Result<Self, ValidationError> {
        match action {
            "pause" => Ok(SessionAction::Pause),
            "resume" => Ok(SessionAction::Resume),
            "stop" => {
                let state = state.ok_or(ValidationError::MissingField("state"))?;
                Ok(SessionAction::Stop(state.parse()?))
            }
            other => Err(ValidationError::InvalidValue {
                field: "action".into(),
                message: format!("unknown action '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionAction::Pause => f.write_str("pause"),
            SessionAction::Resume => f.write_str("resume"),
            SessionAction::Stop(state) => write!(f, "stop ({state:?})"),
        }
    }
}

/// The authoritative state after an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: PomodoroSession,
    pub phase: SessionPhase,
    /// The final cycle of the sequence has completed.
    pub all_cycles_completed: bool,
    pub events: Vec<SessionEvent>,
}

impl SessionReport {
    fn new(session: PomodoroSession, all_cycles_completed: bool, events: Vec<SessionEvent>) -> Self {
        Self {
            phase: session.phase(),
            session,
            all_cycles_completed,
            events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: SessionPhase,
    /// The active session, or the most recent one when `phase` is `Ready`.
    pub session: Option<PomodoroSession>,
}

pub struct PomodoroEngine<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
}

impl<'a> PomodoroEngine<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self { db, clock }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new session for `actor`.
    ///
    /// Fails with `InvalidState` while another session is still running. A
    /// stale session whose time has already run out is reconciled first, so
    /// it does not block a new start. With a time-machine date every session
    /// touched along the way is flagged as cheated.
    pub fn start(
        &self,
        actor: &Actor,
        settings: SessionSettings,
        time_machine: Option<DateTime<Utc>>,
    ) -> Result<SessionReport> {
        settings.validate()?;
        let now = clock::resolve(self.clock, time_machine);

        if let Some(active) = self.db.latest_active_session(&actor.id)? {
            let still_active = match active.progress_at(now) {
                Progress::BeforeStart => true,
                _ => self
                    .reconcile(active.clone(), now, time_machine.is_some())?
                    .session
                    .is_active(),
            };
            if still_active {
                return Err(CoreError::InvalidState(format!(
                    "session {} is still active",
                    active.id
                )));
            }
        }

        let cycle = match self.db.last_chainable_session(&actor.id)? {
            Some(mut predecessor) => {
                predecessor.checked = true;
                self.db.update_session(&predecessor)?;
                tracing::debug!(
                    predecessor_id = %predecessor.id,
                    cycle = predecessor.cycle,
                    "continuing chain"
                );
                (predecessor.cycle + 1).min(settings.total_cycles)
            }
            None => 1,
        };

        let mut session = PomodoroSession::new(actor.id.clone(), settings, cycle, now);
        session.cheated = time_machine.is_some();
        self.db.insert_session(&session)?;
        mirror::open_mirror(self.db, &session);

        tracing::info!(
            session_id = %session.id,
            cycle = session.cycle,
            total_cycles = settings.total_cycles,
            cheated = session.cheated,
            "pomodoro session started"
        );

        let event = SessionEvent::SessionStarted {
            session_id: session.id.clone(),
            cycle: session.cycle,
            total_cycles: settings.total_cycles,
            at: now,
        };
        Ok(SessionReport::new(session, false, vec![event]))
    }

    pub fn apply(
        &self,
        actor: &Actor,
        session_id: &str,
        action: SessionAction,
        time_machine: Option<DateTime<Utc>>,
    ) -> Result<SessionReport> {
        match action {
            SessionAction::Pause => self.pause(actor, session_id, time_machine),
            SessionAction::Resume => self.resume(actor, session_id, time_machine),
            SessionAction::Stop(state) => self.stop(actor, session_id, state, time_machine),
        }
    }

    /// Pause a session. Pausing an already paused session changes nothing.
    pub fn pause(
        &self,
        actor: &Actor,
        session_id: &str,
        time_machine: Option<DateTime<Utc>>,
    ) -> Result<SessionReport> {
        let now = clock::resolve(self.clock, time_machine);
        let mut session = self.load_open(actor, session_id, "pause", now)?;
        self.flag_cheated(&mut session, time_machine.is_some());

        let mut events = Vec::new();
        if session.pause(now) {
            events.push(SessionEvent::SessionPaused {
                session_id: session.id.clone(),
                at: now,
            });
            tracing::info!(session_id = %session.id, "pomodoro session paused");
        }
        self.db.update_session(&session)?;
        Ok(SessionReport::new(session, false, events))
    }

    /// Resume a paused session, adding the pause to `total_paused_secs`.
    /// Resuming a running session changes nothing.
    pub fn resume(
        &self,
        actor: &Actor,
        session_id: &str,
        time_machine: Option<DateTime<Utc>>,
    ) -> Result<SessionReport> {
        let now = clock::resolve(self.clock, time_machine);
        let mut session = self.load_open(actor, session_id, "resume", now)?;
        self.flag_cheated(&mut session, time_machine.is_some());

        let mut events = Vec::new();
        if session.resume(now) {
            events.push(SessionEvent::SessionResumed {
                session_id: session.id.clone(),
                total_paused_secs: session.total_paused_secs,
                at: now,
            });
            tracing::info!(
                session_id = %session.id,
                total_paused_secs = session.total_paused_secs,
                "pomodoro session resumed"
            );
        }
        self.db.update_session(&session)?;
        Ok(SessionReport::new(session, false, events))
    }

    pub fn stop(
        &self,
        actor: &Actor,
        session_id: &str,
        state: StopState,
        time_machine: Option<DateTime<Utc>>,
    ) -> Result<SessionReport> {
        let now = clock::resolve(self.clock, time_machine);
        let mut session = self.load_open(actor, session_id, "stop", now)?;
        self.flag_cheated(&mut session, time_machine.is_some());

        let mut events = Vec::new();
        let mut all_cycles_completed = false;
        match state {
            StopState::Aborted => {
                session.completed = true;
                events.push(SessionEvent::SessionAborted {
                    session_id: session.id.clone(),
                    cycle: session.cycle,
                    at: now,
                });
            }
            StopState::Completed => {
                session.resume(now);
                session.completed = true;
                session.end_time = Some(now);
                session.interval_time.get_or_insert(now);
                events.push(SessionEvent::SessionCompleted {
                    session_id: session.id.clone(),
                    cycle: session.cycle,
                    at: now,
                });
                if session.is_last_cycle() {
                    all_cycles_completed = true;
                    events.push(SessionEvent::AllCyclesCompleted {
                        total_cycles: session.settings.total_cycles,
                        at: now,
                    });
                }
            }
            StopState::Interval => {
                session.interval_time = Some(now);
                events.push(SessionEvent::BreakStarted {
                    session_id: session.id.clone(),
                    cycle: session.cycle,
                    kind: session.break_kind(),
                    at: now,
                });
            }
        }

        self.db.update_session(&session)?;
        if session.completed {
            mirror::close_mirror(self.db, &session, now);
        }
        tracing::info!(session_id = %session.id, ?state, "pomodoro session stopped");
        Ok(SessionReport::new(session, all_cycles_completed, events))
    }

    /// Remove every cheated session and event of `actor`.
    pub fn purge_cheated(&self, actor: &Actor) -> Result<PurgeSummary> {
        let summary = self.db.purge_cheated(&actor.id)?;
        tracing::info!(
            deleted_sessions = summary.deleted_sessions,
            deleted_events = summary.deleted_events,
            "purged cheated pomodoro data"
        );
        Ok(summary)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The authoritative state of the user's latest session as of `as_of`
    /// (or now).
    ///
    /// An open session is reconciled against that instant first. With
    /// `cheated`, the reconciled sessions and their mirrors are flagged for a
    /// later [`purge_cheated`](Self::purge_cheated).
    pub fn query_last(
        &self,
        actor: &Actor,
        as_of: Option<DateTime<Utc>>,
        cheated: bool,
    ) -> Result<SessionReport> {
        let at = clock::resolve(self.clock, as_of);

        if let Some(active) = self.db.latest_active_session(&actor.id)? {
            return self.reconcile(active, at, cheated);
        }

        match self.db.latest_session(&actor.id)? {
            Some(last) => {
                let finished_chain = last.phase() == SessionPhase::Completed && last.is_last_cycle();
                Ok(SessionReport::new(last, finished_chain, Vec::new()))
            }
            None => Err(CoreError::not_found("session", actor.id.clone())),
        }
    }

    /// Current phase, `Ready` when nothing is running.
    ///
    /// Like [`query_last`](Self::query_last) this reconciles an open session.
    /// A simulated `as_of` flags whatever it touches as cheated.
    pub fn status(&self, actor: &Actor, as_of: Option<DateTime<Utc>>) -> Result<StatusReport> {
        let at = clock::resolve(self.clock, as_of);

        if let Some(active) = self.db.latest_active_session(&actor.id)? {
            if active.progress_at(at) != Progress::BeforeStart {
                let report = self.reconcile(active, at, as_of.is_some())?;
                if report.session.is_active() {
                    return Ok(StatusReport {
                        phase: report.phase,
                        session: Some(report.session),
                    });
                }
                return Ok(StatusReport {
                    phase: SessionPhase::Ready,
                    session: Some(report.session),
                });
            }
            return Ok(StatusReport {
                phase: active.phase(),
                session: Some(active),
            });
        }

        Ok(StatusReport {
            phase: SessionPhase::Ready,
            session: self.db.latest_session(&actor.id)?,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Bring an open session up to date with `at`.
    ///
    /// Chains successors while whole sessions have elapsed. The loop runs at
    /// most `total_cycles + 1` times.
    fn reconcile(
        &self,
        mut current: PomodoroSession,
        at: DateTime<Utc>,
        cheated: bool,
    ) -> Result<SessionReport> {
        if current.progress_at(at) == Progress::BeforeStart {
            return Err(CoreError::InvalidState(format!(
                "requested time {at} precedes the start of session {} ({})",
                current.id, current.start_time
            )));
        }
        self.flag_cheated(&mut current, cheated);

        let mut events = Vec::new();
        let max_steps = current.settings.total_cycles as usize + 1;

        for _ in 0..max_steps {
            let progress = current.progress_at(at);
            tracing::debug!(
                session_id = %current.id,
                cycle = current.cycle,
                ?progress,
                elapsed_secs = current.elapsed_at(at).num_seconds(),
                "reconciling session"
            );

            match progress {
                Progress::BeforeStart | Progress::Studying => {
                    self.db.update_session(&current)?;
                    return Ok(SessionReport::new(current, false, events));
                }
                Progress::OnBreak => {
                    if current.interval_time.is_none() {
                        let boundary = current.interval_boundary();
                        current.interval_time = Some(boundary);
                        events.push(SessionEvent::BreakStarted {
                            session_id: current.id.clone(),
                            cycle: current.cycle,
                            kind: current.break_kind(),
                            at: boundary,
                        });
                    }
                    self.db.update_session(&current)?;
                    return Ok(SessionReport::new(current, false, events));
                }
                Progress::Elapsed => {
                    let end = current.end_boundary();
                    current.finalize();
                    events.push(SessionEvent::SessionCompleted {
                        session_id: current.id.clone(),
                        cycle: current.cycle,
                        at: end,
                    });

                    if current.is_last_cycle() {
                        self.db.update_session(&current)?;
                        mirror::close_mirror(self.db, &current, end);
                        events.push(SessionEvent::AllCyclesCompleted {
                            total_cycles: current.settings.total_cycles,
                            at: end,
                        });
                        tracing::info!(
                            session_id = %current.id,
                            total_cycles = current.settings.total_cycles,
                            "all pomodoro cycles completed"
                        );
                        return Ok(SessionReport::new(current, true, events));
                    }

                    current.checked = true;
                    self.db.update_session(&current)?;
                    mirror::close_mirror(self.db, &current, end);

                    let next = current.successor(end);
                    self.db.insert_session(&next)?;
                    mirror::open_mirror(self.db, &next);
                    events.push(SessionEvent::SuccessorStarted {
                        session_id: next.id.clone(),
                        predecessor_id: current.id.clone(),
                        cycle: next.cycle,
                        at: end,
                    });
                    tracing::info!(
                        session_id = %next.id,
                        predecessor_id = %current.id,
                        cycle = next.cycle,
                        "pomodoro successor session synthesized"
                    );
                    current = next;
                }
            }
        }

        Err(CoreError::InvalidState(format!(
            "session chain for {} did not settle within {max_steps} steps",
            current.owner_id
        )))
    }

    /// Load a session the actor may act on at `at`.
    fn load_open(
        &self,
        actor: &Actor,
        session_id: &str,
        action: &'static str,
        at: DateTime<Utc>,
    ) -> Result<PomodoroSession> {
        let session = self
            .db
            .get_session(session_id)?
            .ok_or_else(|| CoreError::not_found("session", session_id))?;
        if !actor.owns(&session.owner_id) {
            return Err(CoreError::unauthorized(action, session_id));
        }
        if session.completed {
            return Err(CoreError::InvalidState(format!(
                "session {session_id} is already finished"
            )));
        }
        if at < session.start_time {
            return Err(CoreError::InvalidState(format!(
                "requested time {at} precedes the start of session {session_id} ({})",
                session.start_time
            )));
        }
        Ok(session)
    }

    fn flag_cheated(&self, session: &mut PomodoroSession, cheated: bool) {
        if cheated && !session.cheated {
            session.cheated = true;
            mirror::flag_mirror_cheated(self.db, session);
        }
    }
}
