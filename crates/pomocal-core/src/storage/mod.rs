mod config;
pub mod database;
pub mod migrations;

pub use config::{CalendarConfig, Config, LogConfig, PomodoroConfig, UserConfig};
pub use database::{Database, PurgeSummary};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml` and `pomocal.db`.
///
/// `POMOCAL_DATA_DIR` wins when set. Otherwise `~/.config/pomocal[-dev]/`,
/// chosen by `POMOCAL_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("POMOCAL_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("POMOCAL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomocal-dev")
            } else {
                base_dir.join("pomocal")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
