//! Runtime configuration for embedding the attendance core.
//!
//! Values come from the environment with fixed fallbacks:
//! - `ROLLBOOK_DB_PATH`: SQLite file, default `rollbook.sqlite3`.
//! - `ROLLBOOK_LOG_LEVEL`: `trace|debug|info|warn|error`, default per build mode.
//! - `ROLLBOOK_LOG_DIR`: absolute directory for rolling logs; unset disables
//!   file logging.

use crate::db::{open_db, DbError};
use crate::logging::{default_log_level, init_logging, LoggingError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "ROLLBOOK_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "ROLLBOOK_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "ROLLBOOK_LOG_DIR";
pub const DEFAULT_DB_FILE_NAME: &str = "rollbook.sqlite3";

/// Failure while bringing the core up from configuration.
#[derive(Debug)]
pub enum BootstrapError {
    Logging(LoggingError),
    Db(DbError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<LoggingError> for BootstrapError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for BootstrapError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Core settings: database location and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from any key lookup; blank values use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_level: read(LOG_LEVEL_ENV).unwrap_or(defaults.log_level),
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
        }
    }

    /// Starts file logging when a directory is configured, then opens the
    /// migrated database.
    pub fn bootstrap(&self) -> Result<Connection, BootstrapError> {
        if let Some(log_dir) = &self.log_dir {
            init_logging(&self.log_level, log_dir)?;
        }
        Ok(open_db(&self.db_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use crate::logging::default_log_level;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn missing_and_blank_values_fall_back_to_defaults() {
        let values = HashMap::from([(LOG_LEVEL_ENV, "   ")]);
        let config = CoreConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("rollbook.sqlite3"));
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn explicit_values_are_trimmed_and_used() {
        let values = HashMap::from([
            (DB_PATH_ENV, " /tmp/attendance.db "),
            (LOG_LEVEL_ENV, "warn"),
            (LOG_DIR_ENV, "/tmp/rollbook-logs"),
        ]);
        let config = CoreConfig::from_lookup(|key| values.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/attendance.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/rollbook-logs")));
    }
}
