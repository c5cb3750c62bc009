//! Calendar event commands for CLI.

use clap::{Args, Subcommand};
use pomocal_core::clock::parse_instant;
use pomocal_core::{Database, EventDraft, EventService, Repetition, SystemClock};

use super::{parse_at, print_json, Context};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create an event; repeating events are expanded right away
    Create {
        /// Event title
        title: String,
        /// Start (RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// End (defaults to the start)
        #[arg(long)]
        end: Option<String>,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Edit an event you own
    Update {
        /// Event ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New start
        #[arg(long)]
        start: Option<String>,
        /// New end
        #[arg(long)]
        end: Option<String>,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Delete an event you own, with its occurrences
    Delete {
        /// Event ID
        id: String,
    },
    /// List events you own or are invited to
    List {
        /// Evaluate overdue deadlines as of this instant
        #[arg(long)]
        at: Option<String>,
    },
    /// Get event details
    Get {
        /// Event ID
        id: String,
    },
    /// Mark a deadline as completed
    Complete {
        /// Event ID
        id: String,
    },
    /// Decline an invitation
    Decline {
        /// Event ID
        id: String,
    },
    /// Show your newest Pomodoro event
    LastPomodoro,
}

/// Optional fields shared by create and update.
#[derive(Args)]
pub struct EventFields {
    /// Deadline flag (true or false)
    #[arg(long)]
    deadline: Option<bool>,
    /// Description
    #[arg(long)]
    description: Option<String>,
    /// Comma-separated invitee emails
    #[arg(long)]
    invite: Option<String>,
    /// Color (e.g. "#007bff")
    #[arg(long)]
    color: Option<String>,
    /// Repetition: none, daily, weekly, monthly or yearly
    #[arg(long)]
    repeat: Option<Repetition>,
    /// Last instant an occurrence may start at
    #[arg(long)]
    until: Option<String>,
}

impl EventFields {
    fn apply(self, draft: &mut EventDraft) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(deadline) = self.deadline {
            draft.is_deadline = deadline;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(invite) = self.invite {
            draft.invited = invite
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(color) = self.color {
            draft.color = Some(color);
        }
        if let Some(repeat) = self.repeat {
            draft.repetition = repeat;
            if !repeat.is_repeating() {
                draft.end_repetition = None;
            }
        }
        if let Some(until) = self.until {
            draft.end_repetition = Some(parse_instant(&until)?);
        }
        Ok(())
    }
}

pub fn run(ctx: &Context, action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let clock = SystemClock;
    let service =
        EventService::new(&db, &clock).with_default_color(ctx.config.calendar.default_color.clone());

    match action {
        EventAction::Create {
            title,
            start,
            end,
            fields,
        } => {
            let start = parse_instant(&start)?;
            let end = end.as_deref().map(parse_instant).transpose()?.unwrap_or(start);
            let mut draft = EventDraft::new(title, start, end);
            fields.apply(&mut draft)?;
            let event = service.create(&ctx.actor, draft)?;
            print_json(&event)?;
        }
        EventAction::Update {
            id,
            title,
            start,
            end,
            fields,
        } => {
            let existing = service.get(&id)?;
            let mut draft = EventDraft::from(&existing);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(start) = start {
                draft.start = parse_instant(&start)?;
            }
            if let Some(end) = end {
                draft.end = parse_instant(&end)?;
            }
            fields.apply(&mut draft)?;
            let event = service.update(&ctx.actor, &id, draft)?;
            print_json(&event)?;
        }
        EventAction::Delete { id } => {
            let removed = service.delete(&ctx.actor, &id)?;
            print_json(&serde_json::json!({ "deleted": removed }))?;
        }
        EventAction::List { at } => {
            let events = service.list(&ctx.actor, parse_at(at.as_deref())?)?;
            print_json(&events)?;
        }
        EventAction::Get { id } => {
            print_json(&service.get(&id)?)?;
        }
        EventAction::Complete { id } => {
            print_json(&service.complete(&ctx.actor, &id)?)?;
        }
        EventAction::Decline { id } => {
            print_json(&service.decline(&ctx.actor, &id)?)?;
        }
        EventAction::LastPomodoro => {
            print_json(&service.last_pomodoro_event(&ctx.actor)?)?;
        }
    }
    Ok(())
}
