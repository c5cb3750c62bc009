//! Pomodoro session records.
//!
//! A session is one study interval plus the break that follows it. Everything
//! about its progress is derived from stored timestamps; there is no
//! remaining-time counter to keep in sync.
//!
//! ```text
//! start_time        interval boundary               end boundary
//!     |---- duration ----|---- short / long break ----|
//! ```
//!
//! Accumulated pauses push both boundaries back, and a paused session's clock
//! stands still at `paused_time`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Timing parameters shared by every cycle of a Pomodoro sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub duration_minutes: u32,
    pub break_minutes: u32,
    pub long_break_minutes: u32,
    pub cycles_before_long_break: u32,
    pub total_cycles: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            cycles_before_long_break: 4,
            total_cycles: 4,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("duration_minutes", self.duration_minutes),
            ("cycles_before_long_break", self.cycles_before_long_break),
            ("total_cycles", self.total_cycles),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn is_long_break(&self, cycle: u32) -> bool {
        self.cycles_before_long_break != 0 && cycle % self.cycles_before_long_break == 0
    }

    /// Break length following the given cycle.
    pub fn break_for_cycle(&self, cycle: u32) -> u32 {
        if self.is_long_break(cycle) {
            self.long_break_minutes
        } else {
            self.break_minutes
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No active session.
    Ready,
    Active,
    /// On break.
    Interval,
    Paused,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Short,
    Long,
}

/// Where a session stands at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    BeforeStart,
    Studying,
    OnBreak,
    /// Study and break are both over.
    Elapsed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PomodoroSession {
    pub id: String,
    pub owner_id: String,
    pub start_time: DateTime<Utc>,
    pub paused_time: Option<DateTime<Utc>>,
    pub interval_time: Option<DateTime<Utc>>,
    /// Accumulated pause, in seconds.
    pub total_paused_secs: i64,
    #[serde(flatten)]
    pub settings: SessionSettings,
    /// 1-indexed.
    pub cycle: u32,
    pub completed: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub cheated: bool,
    /// Already used as the predecessor of a chained session.
    pub checked: bool,
}

impl PomodoroSession {
    pub fn new(
        owner_id: impl Into<String>,
        settings: SessionSettings,
        cycle: u32,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            start_time,
            paused_time: None,
            interval_time: None,
            total_paused_secs: 0,
            settings,
            cycle,
            completed: false,
            end_time: None,
            cheated: false,
            checked: false,
        }
    }

    /// The next session of the chain, starting where this one ended.
    ///
    /// The cycle never goes past `total_cycles`.
    pub fn successor(&self, start_time: DateTime<Utc>) -> Self {
        let cycle = (self.cycle + 1).min(self.settings.total_cycles);
        let mut next = Self::new(self.owner_id.clone(), self.settings, cycle, start_time);
        next.cheated = self.cheated;
        next
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }

    pub fn is_last_cycle(&self) -> bool {
        self.cycle >= self.settings.total_cycles
    }

    /// Break length for this cycle, in minutes.
    pub fn break_minutes(&self) -> u32 {
        self.settings.break_for_cycle(self.cycle)
    }

    pub fn break_kind(&self) -> BreakKind {
        if self.settings.is_long_break(self.cycle) {
            BreakKind::Long
        } else {
            BreakKind::Short
        }
    }

    /// Study plus break, in minutes.
    pub fn total_minutes(&self) -> u32 {
        self.settings.duration_minutes + self.break_minutes()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.completed {
            if self.end_time.is_some() {
                SessionPhase::Completed
            } else {
                SessionPhase::Aborted
            }
        } else if self.paused_time.is_some() {
            SessionPhase::Paused
        } else if self.interval_time.is_some() {
            SessionPhase::Interval
        } else {
            SessionPhase::Active
        }
    }

    fn paused_offset(&self) -> Duration {
        Duration::seconds(self.total_paused_secs)
    }

    /// Instant the break starts, given the pauses recorded so far.
    pub fn interval_boundary(&self) -> DateTime<Utc> {
        self.start_time
            + self.paused_offset()
            + Duration::minutes(i64::from(self.settings.duration_minutes))
    }

    /// Instant the break ends, given the pauses recorded so far.
    pub fn end_boundary(&self) -> DateTime<Utc> {
        self.start_time + self.paused_offset() + Duration::minutes(i64::from(self.total_minutes()))
    }

    /// Time spent un-paused since `start_time`, as of `at`.
    pub fn elapsed_at(&self, at: DateTime<Utc>) -> Duration {
        let frozen = self.paused_time.map_or(at, |paused| paused.min(at));
        (frozen - self.start_time) - self.paused_offset()
    }

    pub fn progress_at(&self, at: DateTime<Utc>) -> Progress {
        if at < self.start_time {
            return Progress::BeforeStart;
        }
        let elapsed = self.elapsed_at(at);
        if elapsed < Duration::minutes(i64::from(self.settings.duration_minutes)) {
            Progress::Studying
        } else if elapsed < Duration::minutes(i64::from(self.total_minutes())) {
            Progress::OnBreak
        } else {
            Progress::Elapsed
        }
    }

    pub fn pause(&mut self, at: DateTime<Utc>) -> bool {
        if self.paused_time.is_some() {
            return false;
        }
        self.paused_time = Some(at);
        true
    }

    pub fn resume(&mut self, at: DateTime<Utc>) -> bool {
        let Some(paused) = self.paused_time.take() else {
            return false;
        };
        self.total_paused_secs += (at - paused).num_seconds().max(0);
        true
    }

    /// Close the session at its natural end.
    pub fn finalize(&mut self) {
        self.interval_time = Some(self.interval_boundary());
        self.end_time = Some(self.end_boundary());
        self.paused_time = None;
        self.completed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    fn session(cycle: u32) -> PomodoroSession {
        PomodoroSession::new("user", SessionSettings::default(), cycle, t0())
    }

    #[test]
    fn long_break_every_nth_cycle() {
        assert_eq!(session(1).break_kind(), BreakKind::Short);
        assert_eq!(session(1).break_minutes(), 5);
        assert_eq!(session(4).break_kind(), BreakKind::Long);
        assert_eq!(session(4).total_minutes(), 40);
        assert_eq!(session(8).break_kind(), BreakKind::Long);
    }

    #[test]
    fn progress_follows_boundaries() {
        let s = session(1);
        assert_eq!(s.progress_at(t0() - Duration::seconds(1)), Progress::BeforeStart);
        assert_eq!(s.progress_at(t0()), Progress::Studying);
        assert_eq!(s.progress_at(t0() + Duration::minutes(25)), Progress::OnBreak);
        assert_eq!(s.progress_at(t0() + Duration::minutes(29)), Progress::OnBreak);
        assert_eq!(s.progress_at(t0() + Duration::minutes(30)), Progress::Elapsed);
    }

    #[test]
    fn pauses_shift_the_boundaries() {
        let mut s = session(1);
        assert!(s.pause(t0() + Duration::minutes(10)));
        // Frozen while paused.
        assert_eq!(s.progress_at(t0() + Duration::hours(3)), Progress::Studying);
        assert!(s.resume(t0() + Duration::minutes(20)));
        assert_eq!(s.total_paused_secs, 600);
        assert_eq!(s.interval_boundary(), t0() + Duration::minutes(35));
        assert_eq!(s.progress_at(t0() + Duration::minutes(34)), Progress::Studying);
        assert_eq!(s.progress_at(t0() + Duration::minutes(35)), Progress::OnBreak);
    }

    #[test]
    fn second_pause_is_a_no_op() {
        let mut s = session(1);
        assert!(s.pause(t0() + Duration::minutes(1)));
        assert!(!s.pause(t0() + Duration::minutes(2)));
        assert_eq!(s.paused_time, Some(t0() + Duration::minutes(1)));
        assert!(s.resume(t0() + Duration::minutes(3)));
        assert!(!s.resume(t0() + Duration::minutes(4)));
        assert_eq!(s.total_paused_secs, 120);
    }

    #[test]
    fn phases() {
        let mut s = session(1);
        assert_eq!(s.phase(), SessionPhase::Active);
        s.interval_time = Some(t0());
        assert_eq!(s.phase(), SessionPhase::Interval);
        s.paused_time = Some(t0());
        assert_eq!(s.phase(), SessionPhase::Paused);
        s.completed = true;
        assert_eq!(s.phase(), SessionPhase::Aborted);
        s.end_time = Some(t0());
        assert_eq!(s.phase(), SessionPhase::Completed);
    }

    #[test]
    fn successor_caps_cycle_and_keeps_cheated() {
        let mut last = session(4);
        last.cheated = true;
        let next = last.successor(t0());
        assert_eq!(next.cycle, 4);
        assert!(next.cheated);
        assert_ne!(next.id, last.id);

        let next = session(2).successor(t0());
        assert_eq!(next.cycle, 3);
        assert!(!next.checked);
    }

    #[test]
    fn finalize_sets_natural_end() {
        let mut s = session(1);
        s.finalize();
        assert!(s.completed);
        assert_eq!(s.interval_time, Some(t0() + Duration::minutes(25)));
        assert_eq!(s.end_time, Some(t0() + Duration::minutes(30)));
    }

    #[test]
    fn settings_validation() {
        assert!(SessionSettings::default().validate().is_ok());
        let zero_cycles = SessionSettings {
            cycles_before_long_break: 0,
            ..SessionSettings::default()
        };
        assert!(zero_cycles.validate().is_err());
        let no_break = SessionSettings {
            break_minutes: 0,
            ..SessionSettings::default()
        };
        assert!(no_break.validate().is_ok());
    }

    #[test]
    fn settings_flatten_into_session_json() {
        let json = serde_json::to_value(session(1)).unwrap();
        assert_eq!(json["duration_minutes"], 25);
        assert_eq!(json["cycle"], 1);
    }
}
