pub mod config;
pub mod event;
pub mod pomodoro;

use chrono::{DateTime, Utc};
use pomocal_core::clock::parse_instant;
use pomocal_core::{Actor, Config};
use serde::Serialize;

/// Who is calling and with which settings.
pub struct Context {
    pub actor: Actor,
    pub config: Config,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an optional `--at` / time-machine argument.
pub fn parse_at(input: Option<&str>) -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error>> {
    Ok(input.map(parse_instant).transpose()?)
}
