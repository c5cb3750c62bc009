//! Event operations with repetition and Pomodoro semantics.
//!
//! Saving a repeating master expands its children right away. The expansion
//! is best-effort: if the children batch fails the master stays saved and the
//! failure is logged at `warn`.

use chrono::{DateTime, Duration, Utc};

use super::event::{Event, EventDraft, EventStatus, DEFAULT_EVENT_COLOR};
use super::recurrence;
use crate::actor::Actor;
use crate::clock::{self, Clock};
use crate::error::{CoreError, Result, ValidationError};
use crate::storage::Database;

pub struct EventService<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
    default_color: String,
}

impl<'a> EventService<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self {
            db,
            clock,
            default_color: DEFAULT_EVENT_COLOR.to_string(),
        }
    }

    /// Color given to events created without one.
    pub fn with_default_color(mut self, color: impl Into<String>) -> Self {
        self.default_color = color.into();
        self
    }

    pub fn create(&self, actor: &Actor, draft: EventDraft) -> Result<Event> {
        draft.validate()?;
        let event = draft.into_event(&actor.id, &self.default_color);
        self.db.insert_event(&event)?;
        tracing::info!(event_id = %event.id, repetition = %event.repetition, "event created");

        if event.is_master() {
            self.expand_children(&event);
        }
        Ok(event)
    }

    /// Replace the editable fields of an event the actor owns.
    ///
    /// A master is re-expanded when it repeats, or when its rule or
    /// `end_repetition` changed: the old children are deleted first.
    pub fn update(&self, actor: &Actor, id: &str, draft: EventDraft) -> Result<Event> {
        draft.validate()?;
        let mut event = self.load_owned(actor, id, "edit")?;

        let rule_changed = event.repetition != draft.repetition;
        let until_changed = event.end_repetition != draft.end_repetition;
        draft.apply_to(&mut event);
        self.db.update_event(&event)?;

        let reexpand = event.parent_event.is_none()
            && (event.repetition.is_repeating() || rule_changed || until_changed);
        if reexpand {
            let removed = self.db.delete_children(&event.id)?;
            tracing::debug!(event_id = %event.id, removed, "dropped previous occurrences");
            if event.is_master() {
                self.expand_children(&event);
            }
        }

        tracing::info!(event_id = %event.id, "event updated");
        Ok(event)
    }

    /// Delete an event and its occurrences. Returns the number of removed rows.
    pub fn delete(&self, actor: &Actor, id: &str) -> Result<usize> {
        self.load_owned(actor, id, "delete")?;
        let removed = self.db.delete_event_cascade(id)?;
        tracing::info!(event_id = %id, removed, "event deleted");
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Event> {
        self.db
            .get_event(id)?
            .ok_or_else(|| CoreError::not_found("event", id))
    }

    /// Events the actor owns or is invited to, ordered by start.
    ///
    /// Overdue deadlines are swept first. Active ones whose end has passed
    /// become expired, and expired ones from an earlier day move to the as-of
    /// day at the same time of day. An expired deadline whose end is not past
    /// the as-of instant is active again. Pomodoro mirrors and completed
    /// deadlines are never touched.
    pub fn list(&self, actor: &Actor, as_of: Option<DateTime<Utc>>) -> Result<Vec<Event>> {
        let now = clock::resolve(self.clock, as_of);
        let mut events = self.db.list_events_for(&actor.id, &actor.email)?;

        let mut swept = 0usize;
        for event in events.iter_mut() {
            if sweep_deadline(event, now) {
                self.db.update_event(event)?;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::debug!(swept, "overdue deadlines swept");
            events.sort_by(|a, b| a.start.cmp(&b.start));
        }
        Ok(events)
    }

    /// Mark a deadline as done.
    pub fn complete(&self, actor: &Actor, id: &str) -> Result<Event> {
        let mut event = self.load_owned(actor, id, "complete")?;
        if !event.is_deadline {
            return Err(ValidationError::InvalidValue {
                field: "is_deadline".into(),
                message: format!("event {id} is not a deadline"),
            }
            .into());
        }
        event.status = EventStatus::Completed;
        self.db.update_event(&event)?;
        tracing::info!(event_id = %id, "deadline completed");
        Ok(event)
    }

    /// Remove the actor from the event's invitation list.
    pub fn decline(&self, actor: &Actor, id: &str) -> Result<Event> {
        let mut event = self.get(id)?;
        let before = event.invited.len();
        event.invited.retain(|email| email != &actor.email);
        if event.invited.len() == before {
            return Err(CoreError::unauthorized("decline", id));
        }
        self.db.update_event(&event)?;
        tracing::info!(event_id = %id, "invitation declined");
        Ok(event)
    }

    /// The actor's newest Pomodoro mirror, by end instant.
    pub fn last_pomodoro_event(&self, actor: &Actor) -> Result<Event> {
        self.db
            .latest_pomodoro_event(&actor.id)?
            .ok_or_else(|| CoreError::not_found("pomodoro event", actor.id.clone()))
    }

    fn load_owned(&self, actor: &Actor, id: &str, action: &'static str) -> Result<Event> {
        let event = self.get(id)?;
        if !actor.owns(&event.owner_id) {
            return Err(CoreError::unauthorized(action, id));
        }
        Ok(event)
    }

    fn expand_children(&self, master: &Event) {
        let children = recurrence::expand(master);
        if children.is_empty() {
            return;
        }
        match self.db.insert_events(&children) {
            Ok(count) => {
                tracing::debug!(event_id = %master.id, count, "occurrences created");
            }
            Err(e) => {
                tracing::warn!(event_id = %master.id, error = %e, "failed to create occurrences");
            }
        }
    }
}

/// Apply the overdue rules to one event. Returns whether it changed.
fn sweep_deadline(event: &mut Event, now: DateTime<Utc>) -> bool {
    if !event.is_deadline || event.is_pomodoro_mirror() || event.status == EventStatus::Completed {
        return false;
    }

    let mut changed = false;
    if event.status == EventStatus::Active && event.end < now {
        event.status = EventStatus::Expired;
        changed = true;
    }
    if event.status == EventStatus::Expired {
        let days_behind = (now.date_naive() - event.end.date_naive()).num_days();
        if days_behind > 0 {
            event.start += Duration::days(days_behind);
            event.end += Duration::days(days_behind);
            changed = true;
        }
        // Rolled or simulated back to before its end: due again.
        if event.end >= now {
            event.status = EventStatus::Active;
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Repetition;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn owner() -> Actor {
        Actor::new("owner", "owner@example.com")
    }

    fn weekly_draft() -> EventDraft {
        EventDraft::new("Review", at(2024, 1, 1, 10), at(2024, 1, 1, 11))
            .repeating(Repetition::Weekly, at(2024, 1, 22, 10))
    }

    #[test]
    fn create_expands_weekly_master() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);

        let master = service.create(&owner(), weekly_draft()).unwrap();
        assert_eq!(master.color, DEFAULT_EVENT_COLOR);
        let children = db.list_children(&master.id).unwrap();
        let days: Vec<u32> = children
            .iter()
            .map(|c| chrono::Datelike::day(&c.start))
            .collect();
        assert_eq!(days, vec![8, 15, 22]);
    }

    #[test]
    fn create_rejects_open_ended_repetition() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let mut draft = weekly_draft();
        draft.end_repetition = None;
        let err = service.create(&owner(), draft).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn update_reexpands_children() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let master = service.create(&owner(), weekly_draft()).unwrap();

        let daily = EventDraft::new("Review", at(2024, 1, 1, 10), at(2024, 1, 1, 11))
            .repeating(Repetition::Daily, at(2024, 1, 5, 10));
        service.update(&owner(), &master.id, daily).unwrap();
        assert_eq!(db.list_children(&master.id).unwrap().len(), 4);

        let single = EventDraft::new("Review", at(2024, 1, 1, 10), at(2024, 1, 1, 11));
        service.update(&owner(), &master.id, single).unwrap();
        assert!(db.list_children(&master.id).unwrap().is_empty());
    }

    #[test]
    fn only_owner_may_edit_or_delete() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let master = service.create(&owner(), weekly_draft()).unwrap();
        let stranger = Actor::new("stranger", "s@example.com");

        let err = service.delete(&stranger, &master.id).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        let err = service
            .update(&stranger, &master.id, weekly_draft())
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        assert_eq!(service.delete(&owner(), &master.id).unwrap(), 4);
        assert!(matches!(
            service.get(&master.id).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn complete_requires_deadline() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);

        let meeting = service
            .create(&owner(), EventDraft::new("Sync", at(2024, 1, 2, 9), at(2024, 1, 2, 10)))
            .unwrap();
        let err = service.complete(&owner(), &meeting.id).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let due = service
            .create(
                &owner(),
                EventDraft::new("Report", at(2024, 1, 2, 17), at(2024, 1, 2, 17)).deadline(),
            )
            .unwrap();
        let done = service.complete(&owner(), &due.id).unwrap();
        assert_eq!(done.status, EventStatus::Completed);
    }

    #[test]
    fn decline_removes_invitee() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let guest = Actor::new("guest", "guest@example.com");

        let mut draft = EventDraft::new("Party", at(2024, 1, 6, 20), at(2024, 1, 6, 23));
        draft.invited = vec!["guest@example.com".into(), "friend@example.com".into()];
        let event = service.create(&owner(), draft).unwrap();

        assert_eq!(service.list(&guest, None).unwrap().len(), 1);
        let declined = service.decline(&guest, &event.id).unwrap();
        assert_eq!(declined.invited, vec!["friend@example.com".to_string()]);
        assert!(service.list(&guest, None).unwrap().is_empty());

        let err = service.decline(&guest, &event.id).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        let err = service.decline(&owner(), &event.id).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        assert_eq!(
            service.get(&event.id).unwrap().invited,
            vec!["friend@example.com".to_string()]
        );
    }

    #[test]
    fn list_expires_and_rolls_overdue_deadlines() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let due = service
            .create(
                &owner(),
                EventDraft::new("Taxes", at(2024, 1, 2, 9), at(2024, 1, 2, 12)).deadline(),
            )
            .unwrap();
        let done = service
            .create(
                &owner(),
                EventDraft::new("Done", at(2024, 1, 2, 9), at(2024, 1, 2, 12)).deadline(),
            )
            .unwrap();
        service.complete(&owner(), &done.id).unwrap();

        // Same day, after the deadline: expired in place.
        let listed = service.list(&owner(), Some(at(2024, 1, 2, 13))).unwrap();
        let swept = listed.iter().find(|e| e.id == due.id).unwrap();
        assert_eq!(swept.status, EventStatus::Expired);
        assert_eq!(swept.end, at(2024, 1, 2, 12));

        // Days later, past its time of day: carried forward, still expired.
        service.list(&owner(), Some(at(2024, 1, 5, 13))).unwrap();
        let rolled = service.get(&due.id).unwrap();
        assert_eq!(rolled.status, EventStatus::Expired);
        assert_eq!(rolled.start, at(2024, 1, 5, 9));
        assert_eq!(rolled.end, at(2024, 1, 5, 12));

        // Listed before its end: active again, nothing moves.
        service.list(&owner(), Some(at(2024, 1, 5, 10))).unwrap();
        let due_again = service.get(&due.id).unwrap();
        assert_eq!(due_again.status, EventStatus::Active);
        assert_eq!(due_again.end, at(2024, 1, 5, 12));

        let untouched = service.get(&done.id).unwrap();
        assert_eq!(untouched.status, EventStatus::Completed);
        assert_eq!(untouched.end, at(2024, 1, 2, 12));
    }

    #[test]
    fn deadline_rolled_onto_a_later_hour_is_active() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let due = service
            .create(
                &owner(),
                EventDraft::new("Report", at(2024, 1, 2, 9), at(2024, 1, 2, 17)).deadline(),
            )
            .unwrap();

        service.list(&owner(), Some(at(2024, 1, 2, 18))).unwrap();
        assert_eq!(service.get(&due.id).unwrap().status, EventStatus::Expired);

        let listed = service.list(&owner(), Some(at(2024, 1, 4, 8))).unwrap();
        assert_eq!(listed[0].status, EventStatus::Active);
        assert_eq!(listed[0].end, at(2024, 1, 4, 17));
        assert_eq!(service.get(&due.id).unwrap().status, EventStatus::Active);
    }

    #[test]
    fn last_pomodoro_event_not_found_when_absent() {
        let db = Database::open_memory().unwrap();
        let clock = FixedClock(at(2024, 1, 1, 8));
        let service = EventService::new(&db, &clock);
        let err = service.last_pomodoro_event(&owner()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
