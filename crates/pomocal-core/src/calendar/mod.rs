//! Calendar events, recurrence expansion, and the event service.

pub mod event;
pub mod recurrence;
pub mod service;

pub use event::{Event, EventDraft, EventStatus, Repetition, DEFAULT_EVENT_COLOR};
pub use service::EventService;
