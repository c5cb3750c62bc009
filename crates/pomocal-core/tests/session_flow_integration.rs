//! Integration tests for the Pomodoro session flow.
//!
//! Drives the engine and the event service against one database, the way the
//! CLI does, and checks that sessions and their calendar mirrors stay in step.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pomocal_core::{
    Actor, CoreError, Database, EventService, EventStatus, FixedClock, PomodoroEngine,
    SessionAction, SessionEvent, SessionPhase, SessionSettings, StopState,
};

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap()
}

fn alice() -> Actor {
    Actor::new("alice", "alice@example.com")
}

fn settings(total_cycles: u32) -> SessionSettings {
    SessionSettings {
        total_cycles,
        ..SessionSettings::default()
    }
}

#[test]
fn test_full_day_time_jump() {
    let db = Database::open_memory().unwrap();
    let clock = FixedClock(morning());
    let engine = PomodoroEngine::new(&db, &clock);
    let events = EventService::new(&db, &clock);

    engine.start(&alice(), settings(4), None).unwrap();
    let report = engine
        .query_last(&alice(), Some(morning() + Duration::hours(8)), true)
        .unwrap();

    assert!(report.all_cycles_completed);
    assert_eq!(report.phase, SessionPhase::Completed);
    assert_eq!(report.session.cycle, 4);
    // 3 x (25 + 5) + (25 + 15)
    assert_eq!(report.session.end_time, Some(morning() + Duration::minutes(130)));
    assert!(matches!(
        report.events.last(),
        Some(SessionEvent::AllCyclesCompleted { total_cycles: 4, .. })
    ));

    let mirrors: Vec<_> = events
        .list(&alice(), Some(morning()))
        .unwrap()
        .into_iter()
        .filter(|e| e.is_pomodoro_mirror())
        .collect();
    assert_eq!(mirrors.len(), 4);
    assert!(mirrors
        .iter()
        .all(|m| m.status == EventStatus::Completed && !m.is_deadline && m.cheated));
    assert_eq!(mirrors[3].title, "Pomodoro Session 4/4");

    let last = events.last_pomodoro_event(&alice()).unwrap();
    assert_eq!(last.end, morning() + Duration::minutes(130));
}

#[test]
fn test_pause_shifts_the_break() {
    let db = Database::open_memory().unwrap();
    let clock = FixedClock(morning());
    let engine = PomodoroEngine::new(&db, &clock);
    let id = engine.start(&alice(), settings(1), None).unwrap().session.id;

    engine
        .apply(&alice(), &id, SessionAction::Pause, Some(morning() + Duration::minutes(10)))
        .unwrap();
    engine
        .apply(&alice(), &id, SessionAction::Resume, Some(morning() + Duration::minutes(20)))
        .unwrap();

    // Without the pause the break would have started at +25.
    let report = engine
        .query_last(&alice(), Some(morning() + Duration::minutes(30)), false)
        .unwrap();
    assert_eq!(report.phase, SessionPhase::Active);

    let report = engine
        .query_last(&alice(), Some(morning() + Duration::minutes(36)), false)
        .unwrap();
    assert_eq!(report.phase, SessionPhase::Interval);
    assert_eq!(
        report.session.interval_time,
        Some(morning() + Duration::minutes(35))
    );
}

#[test]
fn test_paused_session_does_not_advance() {
    let db = Database::open_memory().unwrap();
    let clock = FixedClock(morning());
    let engine = PomodoroEngine::new(&db, &clock);
    let id = engine.start(&alice(), settings(2), None).unwrap().session.id;
    engine
        .pause(&alice(), &id, Some(morning() + Duration::minutes(5)))
        .unwrap();

    let report = engine
        .query_last(&alice(), Some(morning() + Duration::hours(6)), false)
        .unwrap();
    assert_eq!(report.session.id, id);
    assert_eq!(report.phase, SessionPhase::Paused);
    assert_eq!(db.list_sessions("alice").unwrap().len(), 1);
}

#[test]
fn test_stop_completed_then_chain_and_purge() {
    let db = Database::open_memory().unwrap();
    let clock = FixedClock(morning());
    let engine = PomodoroEngine::new(&db, &clock);

    let first = engine.start(&alice(), settings(3), None).unwrap().session;
    let stopped = engine
        .apply(
            &alice(),
            &first.id,
            SessionAction::Stop(StopState::Completed),
            None,
        )
        .unwrap();
    assert_eq!(stopped.phase, SessionPhase::Completed);
    assert!(!stopped.all_cycles_completed);

    let later = morning() + Duration::minutes(40);
    let second = engine.start(&alice(), settings(3), Some(later)).unwrap().session;
    assert_eq!(second.cycle, 2);
    assert!(second.cheated);

    let summary = engine.purge_cheated(&alice()).unwrap();
    assert_eq!(summary.deleted_sessions, 1);
    assert_eq!(summary.deleted_events, 1);
    let remaining = db.list_sessions("alice").unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, first.id);
}

#[test]
fn test_other_users_are_isolated() {
    let db = Database::open_memory().unwrap();
    let clock = FixedClock(morning());
    let engine = PomodoroEngine::new(&db, &clock);
    let bob = Actor::new("bob", "bob@example.com");

    let alice_session = engine.start(&alice(), settings(2), None).unwrap().session;
    // A running session of one user never blocks another.
    engine.start(&bob, settings(2), None).unwrap();

    let err = engine
        .stop(&bob, &alice_session.id, StopState::Aborted, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthorized { .. }));

    let err = engine.query_last(&Actor::new("carol", "c@example.com"), None, false);
    assert!(matches!(err, Err(CoreError::NotFound { .. })));
}
