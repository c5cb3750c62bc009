//! Explicit "now" for the engines.
//!
//! Nothing in the core reads the system time directly. Engines receive a
//! [`Clock`], and a request may carry a time-machine date that replaces it for
//! that single call.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::ValidationError;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant. Used by tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc>,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// The instant an operation should run at: the time-machine date when one was
/// supplied, otherwise the clock's reading.
pub fn resolve(clock: &dyn Clock, time_machine: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match time_machine {
        Some(at) => {
            tracing::debug!(%at, "using time machine date");
            at
        }
        None => clock.now(),
    }
}

/// Parse a user-supplied instant.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD`. Inputs without
/// an offset are read as UTC; a bare date means midnight.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidValue {
        field: "date".into(),
        message: format!("cannot parse '{input}' as a date or timestamp"),
    })
}
