//! Repository error shared by roster and session storage.

use crate::db::DbError;
use crate::model::class_ref::ClassId;
use crate::model::session::{SessionDate, SessionId, SessionValidationError, Slot};
use crate::model::student::StudentId;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from roster/session persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write payload failed model validation before reaching SQL.
    Validation(SessionValidationError),
    /// Required text input is blank after trim.
    InvalidInput(String),
    /// Class does not exist, or exists under a different scope/owner.
    ClassNotFound(ClassId),
    SessionNotFound(SessionId),
    StudentNotFound(StudentId),
    /// Another session already occupies `(class, date, slot)`.
    SlotConflict {
        class_id: ClassId,
        date: SessionDate,
        slot: Slot,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::SessionNotFound(id) => write!(f, "attendance session not found: {id}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::SlotConflict {
                class_id,
                date,
                slot,
            } => write!(
                f,
                "slot {slot} on {date} is already taken for class {class_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SessionValidationError> for RepoError {
    fn from(value: SessionValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Returns whether `err` is a UNIQUE/PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}
