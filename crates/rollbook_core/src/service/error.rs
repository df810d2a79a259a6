//! Error taxonomy surfaced by attendance services.

use crate::model::class_ref::ClassId;
use crate::model::session::{SessionDate, SessionId, SessionValidationError, Slot};
use crate::model::status::InvalidStatus;
use crate::model::student::StudentId;
use crate::repo::error::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from attendance use-cases.
///
/// `SlotConflict` and `NoSlotsAvailable` are the retryable outcomes: callers
/// recompute available slots and try again or report that the day is full.
#[derive(Debug)]
pub enum AttendanceError {
    /// `(class, date, slot)` is already held by another session.
    SlotConflict {
        class_id: ClassId,
        date: SessionDate,
        slot: Slot,
    },
    /// Every slot of the date is taken.
    NoSlotsAvailable {
        class_id: ClassId,
        date: SessionDate,
    },
    /// Status code outside `{P, T, J, A}`.
    InvalidStatus(InvalidStatus),
    /// Slot/date value or write payload rejected by model validation.
    Validation(SessionValidationError),
    ClassNotFound(ClassId),
    SessionNotFound(SessionId),
    StudentNotFound(StudentId),
    /// Stored header counts disagree with stored records.
    InconsistentState(String),
    /// Repository I/O failure.
    Storage(RepoError),
}

impl Display for AttendanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlotConflict {
                class_id,
                date,
                slot,
            } => write!(
                f,
                "slot {slot} on {date} is already taken for class {class_id}"
            ),
            Self::NoSlotsAvailable { class_id, date } => {
                write!(f, "no slots available on {date} for class {class_id}")
            }
            Self::InvalidStatus(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::ClassNotFound(id) => write!(f, "class not found: {id}"),
            Self::SessionNotFound(id) => write!(f, "attendance session not found: {id}"),
            Self::StudentNotFound(id) => write!(f, "student not found: {id}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent attendance state: {details}")
            }
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for AttendanceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidStatus(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AttendanceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::SlotConflict {
                class_id,
                date,
                slot,
            } => Self::SlotConflict {
                class_id,
                date,
                slot,
            },
            RepoError::ClassNotFound(id) => Self::ClassNotFound(id),
            RepoError::SessionNotFound(id) => Self::SessionNotFound(id),
            RepoError::StudentNotFound(id) => Self::StudentNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

impl From<InvalidStatus> for AttendanceError {
    fn from(value: InvalidStatus) -> Self {
        Self::InvalidStatus(value)
    }
}

impl From<SessionValidationError> for AttendanceError {
    fn from(value: SessionValidationError) -> Self {
        Self::Validation(value)
    }
}
