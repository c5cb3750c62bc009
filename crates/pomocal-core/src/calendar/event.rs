//! Calendar event types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Color used for calendar events when the caller does not pick one.
pub const DEFAULT_EVENT_COLOR: &str = "#007bff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Expired,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Expired => "expired",
            EventStatus::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EventStatus::Active),
            "expired" => Ok(EventStatus::Expired),
            "completed" => Ok(EventStatus::Completed),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Repetition rule of a master event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Repetition {
    #[default]
    NoRepetition,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repetition {
    pub fn as_str(self) -> &'static str {
        match self {
            Repetition::NoRepetition => "no-repetition",
            Repetition::Daily => "daily",
            Repetition::Weekly => "weekly",
            Repetition::Monthly => "monthly",
            Repetition::Yearly => "yearly",
        }
    }

    pub fn is_repeating(self) -> bool {
        self != Repetition::NoRepetition
    }
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Repetition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-repetition" | "none" => Ok(Repetition::NoRepetition),
            "daily" => Ok(Repetition::Daily),
            "weekly" => Ok(Repetition::Weekly),
            "monthly" => Ok(Repetition::Monthly),
            "yearly" => Ok(Repetition::Yearly),
            other => Err(ValidationError::InvalidValue {
                field: "repetition".into(),
                message: format!("unknown repetition rule '{other}'"),
            }),
        }
    }
}

/// A calendar entry or deadline.
///
/// Children produced by recurrence expansion point at their master through
/// `parent_event`; events mirroring a Pomodoro session point at it through
/// `session_id`. Both are plain ids into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_deadline: bool,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub invited: Vec<String>,
    pub color: String,
    pub status: EventStatus,
    pub repetition: Repetition,
    pub end_repetition: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cheated: bool,
    pub parent_event: Option<String>,
    pub session_id: Option<String>,
}

impl Event {
    /// A master is an event with an active repetition rule that is not itself
    /// a generated occurrence.
    pub fn is_master(&self) -> bool {
        self.repetition.is_repeating() && self.parent_event.is_none()
    }

    pub fn is_pomodoro_mirror(&self) -> bool {
        self.session_id.is_some()
    }

    /// Build a child occurrence of this master at the given instants.
    pub fn occurrence(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4().to_string(),
            title: self.title.clone(),
            start,
            end,
            is_deadline: self.is_deadline,
            description: self.description.clone(),
            owner_id: self.owner_id.clone(),
            invited: self.invited.clone(),
            color: self.color.clone(),
            status: EventStatus::Active,
            repetition: self.repetition,
            end_repetition: self.end_repetition,
            cheated: self.cheated,
            parent_event: Some(self.id.clone()),
            session_id: None,
        }
    }
}

/// Caller-supplied fields for creating or editing an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_deadline: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub invited: Vec<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub repetition: Repetition,
    pub end_repetition: Option<DateTime<Utc>>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            is_deadline: false,
            description: String::new(),
            invited: Vec::new(),
            color: None,
            repetition: Repetition::NoRepetition,
            end_repetition: None,
        }
    }

    pub fn deadline(mut self) -> Self {
        self.is_deadline = true;
        self
    }

    pub fn repeating(mut self, rule: Repetition, until: DateTime<Utc>) -> Self {
        self.repetition = rule;
        self.end_repetition = Some(until);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.end < self.start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.repetition.is_repeating() && self.end_repetition.is_none() {
            return Err(ValidationError::MissingField("end_repetition"));
        }
        Ok(())
    }

    /// Turn the draft into a fresh event owned by `owner_id`.
    pub fn into_event(self, owner_id: &str, default_color: &str) -> Event {
        Event {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            start: self.start,
            end: self.end,
            is_deadline: self.is_deadline,
            description: self.description,
            owner_id: owner_id.to_string(),
            invited: self.invited,
            color: self.color.unwrap_or_else(|| default_color.to_string()),
            status: EventStatus::Active,
            repetition: self.repetition,
            end_repetition: self.end_repetition,
            cheated: false,
            parent_event: None,
            session_id: None,
        }
    }

    /// Copy the editable fields onto an existing event.
    pub fn apply_to(self, event: &mut Event) {
        event.title = self.title;
        event.start = self.start;
        event.end = self.end;
        event.is_deadline = self.is_deadline;
        event.description = self.description;
        event.invited = self.invited;
        if let Some(color) = self.color {
            event.color = color;
        }
        event.repetition = self.repetition;
        event.end_repetition = self.end_repetition;
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            is_deadline: event.is_deadline,
            description: event.description.clone(),
            invited: event.invited.clone(),
            color: Some(event.color.clone()),
            repetition: event.repetition,
            end_repetition: event.end_repetition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn repetition_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&Repetition::NoRepetition).unwrap();
        assert_eq!(json, "\"no-repetition\"");
        let parsed: Repetition = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(parsed, Repetition::Monthly);
        assert_eq!("weekly".parse::<Repetition>().unwrap(), Repetition::Weekly);
        assert!("fortnightly".parse::<Repetition>().is_err());
    }

    #[test]
    fn draft_validation() {
        assert!(EventDraft::new("Standup", at(1), at(1)).validate().is_ok());
        assert!(matches!(
            EventDraft::new("  ", at(1), at(2)).validate(),
            Err(ValidationError::MissingField("title"))
        ));
        assert!(matches!(
            EventDraft::new("Backwards", at(2), at(1)).validate(),
            Err(ValidationError::InvalidTimeRange { .. })
        ));

        let mut open_ended = EventDraft::new("Gym", at(1), at(1));
        open_ended.repetition = Repetition::Weekly;
        assert!(matches!(
            open_ended.validate(),
            Err(ValidationError::MissingField("end_repetition"))
        ));
    }

    #[test]
    fn occurrence_points_back_at_master() {
        let master = EventDraft::new("Gym", at(1), at(1))
            .repeating(Repetition::Weekly, at(22))
            .into_event("user-1", DEFAULT_EVENT_COLOR);
        let child = master.occurrence(at(8), at(8));

        assert_ne!(child.id, master.id);
        assert_eq!(child.parent_event.as_deref(), Some(master.id.as_str()));
        assert_eq!(child.repetition, Repetition::Weekly);
        assert_eq!(child.color, DEFAULT_EVENT_COLOR);
        assert!(master.is_master());
        assert!(!child.is_master());
    }
}
