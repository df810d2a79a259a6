//! Attendance session (register) model.
//!
//! # Responsibility
//! - Define the session header, its per-student records and derived counts.
//! - Own calendar-date handling so no code path converts a date through UTC.
//!
//! # Invariants
//! - `Slot` is always within `1..=MAX_SLOTS`.
//! - `StatusCounts` can only be built by tallying statuses; the four buckets
//!   always sum to the number of tallied records.
//! - `SessionDate` is a naive calendar day; its storage instant is local
//!   midnight built from year/month/day components.

use crate::model::class_ref::ClassRef;
use crate::model::status::AttendanceStatus;
use crate::model::student::StudentId;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Number of registers a class can take on one calendar day.
pub const MAX_SLOTS: u8 = 5;

/// Stable identifier assigned to a session at creation.
pub type SessionId = Uuid;

/// Status per student, keyed by student id.
///
/// A map guarantees each student is classified exactly once.
pub type StudentStatuses = BTreeMap<StudentId, AttendanceStatus>;

/// Validation failures for session primitives and write payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    /// Slot outside `1..=MAX_SLOTS`.
    InvalidSlot(i64),
    /// Date components or text do not form a calendar day.
    InvalidDate(String),
    /// Header counts disagree with the record set.
    CountsMismatch {
        header: StatusCounts,
        records: StatusCounts,
    },
    /// Same student listed twice in one record set.
    DuplicateStudent(StudentId),
}

impl Display for SessionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSlot(value) => {
                write!(f, "slot {value} is outside 1..={MAX_SLOTS}")
            }
            Self::InvalidDate(value) => write!(f, "invalid calendar date `{value}`"),
            Self::CountsMismatch { header, records } => write!(
                f,
                "session counts {header} do not match record counts {records}"
            ),
            Self::DuplicateStudent(id) => write!(f, "student {id} appears twice in one session"),
        }
    }
}

impl Error for SessionValidationError {}

/// Register number within one class and day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Slot(u8);

impl Slot {
    pub fn new(value: u8) -> Result<Self, SessionValidationError> {
        if (1..=MAX_SLOTS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SessionValidationError::InvalidSlot(i64::from(value)))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every slot in ascending order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=MAX_SLOTS).map(Slot)
    }
}

impl TryFrom<u8> for Slot {
    type Error = SessionValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Slot {
    type Error = SessionValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| SessionValidationError::InvalidSlot(value))
            .and_then(Self::new)
    }
}

impl From<Slot> for u8 {
    fn from(value: Slot) -> Self {
        value.0
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar day on which a session was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDate(NaiveDate);

impl SessionDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, SessionValidationError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| {
                SessionValidationError::InvalidDate(format!("{year:04}-{month:02}-{day:02}"))
            })
    }

    /// Parses a `YYYY-MM-DD` key into its calendar components.
    ///
    /// The text is split into year/month/day; it is never interpreted as an
    /// instant, so the day cannot shift with the caller's zone.
    pub fn parse(value: &str) -> Result<Self, SessionValidationError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| SessionValidationError::InvalidDate(value.to_string()))
    }

    /// Today in the local zone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn naive(self) -> NaiveDate {
        self.0
    }

    /// Canonical `YYYY-MM-DD` storage key.
    pub fn key(self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }

    /// Epoch milliseconds of local midnight on this day.
    ///
    /// Where a DST transition skips midnight, the first valid local instant
    /// of the day is used.
    pub fn local_midnight_epoch_ms(self) -> i64 {
        let midnight = self.0.and_time(NaiveTime::MIN);
        first_valid_local_instant(midnight)
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
    }
}

fn first_valid_local_instant(midnight: NaiveDateTime) -> Option<i64> {
    (0..=3).find_map(|hours| {
        Local
            .from_local_datetime(&(midnight + Duration::hours(hours)))
            .earliest()
            .map(|at| at.timestamp_millis())
    })
}

impl Display for SessionDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Per-status totals of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    present: u32,
    late: u32,
    justified: u32,
    absent: u32,
}

impl StatusCounts {
    /// Classifies every status into exactly one bucket.
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Late => counts.late += 1,
                AttendanceStatus::Justified => counts.justified += 1,
                AttendanceStatus::Absent => counts.absent += 1,
            }
        }
        counts
    }

    pub fn present(&self) -> u32 {
        self.present
    }

    pub fn late(&self) -> u32 {
        self.late
    }

    pub fn justified(&self) -> u32 {
        self.justified
    }

    pub fn absent(&self) -> u32 {
        self.absent
    }

    pub fn total(&self) -> u32 {
        self.present + self.late + self.justified + self.absent
    }

    /// Rebuilds counts read back from storage. Callers must still compare the
    /// result with a tally of the stored records.
    pub(crate) fn from_stored(present: u32, late: u32, justified: u32, absent: u32) -> Self {
        Self {
            present,
            late,
            justified,
            absent,
        }
    }
}

impl Display for StatusCounts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "P={} T={} J={} A={}",
            self.present, self.late, self.justified, self.absent
        )
    }
}

/// One student's status inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
}

/// Converts a status mapping into records ordered by student id.
pub fn records_from_statuses(statuses: &StudentStatuses) -> Vec<StudentRecord> {
    statuses
        .iter()
        .map(|(student_id, status)| StudentRecord {
            student_id: *student_id,
            status: *status,
        })
        .collect()
}

/// Checks that `counts` equals the tally of `records` and that no student
/// appears twice.
pub fn validate_records(
    counts: &StatusCounts,
    records: &[StudentRecord],
) -> Result<(), SessionValidationError> {
    let mut seen = BTreeSet::new();
    for record in records {
        if !seen.insert(record.student_id) {
            return Err(SessionValidationError::DuplicateStudent(record.student_id));
        }
    }

    let tallied = StatusCounts::tally(records.iter().map(|record| record.status));
    if tallied != *counts {
        return Err(SessionValidationError::CountsMismatch {
            header: *counts,
            records: tallied,
        });
    }
    Ok(())
}

/// One register for one class on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub class_ref: ClassRef,
    pub date: SessionDate,
    pub slot: Slot,
    pub counts: StatusCounts,
    /// Epoch ms; set once when the session is first stored.
    pub created_at: i64,
    /// Epoch ms of the last successful write.
    pub updated_at: i64,
}
