//! Per-student attendance status and its edit cycle.
//!
//! # Invariants
//! - The cycle order is fixed: Present -> Late -> Justified -> Absent -> Present.
//! - Wire/storage codes are the one-letter `P`, `T`, `J`, `A`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Outcome recorded for one student in one session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AttendanceStatus {
    #[default]
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "T")]
    Late,
    #[serde(rename = "J")]
    Justified,
    #[serde(rename = "A")]
    Absent,
}

impl AttendanceStatus {
    /// All statuses in cycle order.
    pub const CYCLE: [Self; 4] = [Self::Present, Self::Late, Self::Justified, Self::Absent];

    /// Returns the status following `self` in the edit cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Present => Self::Late,
            Self::Late => Self::Justified,
            Self::Justified => Self::Absent,
            Self::Absent => Self::Present,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Present => "P",
            Self::Late => "T",
            Self::Justified => "J",
            Self::Absent => "A",
        }
    }

    /// Parses a one-letter status code. Surrounding whitespace is ignored,
    /// case is not.
    pub fn from_code(code: &str) -> Result<Self, InvalidStatus> {
        match code.trim() {
            "P" => Ok(Self::Present),
            "T" => Ok(Self::Late),
            "J" => Ok(Self::Justified),
            "A" => Ok(Self::Absent),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl Display for AttendanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AttendanceStatus {
    type Err = InvalidStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_code(value)
    }
}

/// Advances a raw status code one step through the cycle.
///
/// Used by callers that hold statuses as codes (UI cells, imported rows).
pub fn next_status_code(code: &str) -> Result<AttendanceStatus, InvalidStatus> {
    AttendanceStatus::from_code(code).map(AttendanceStatus::next)
}

/// A status value outside `{P, T, J, A}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl Display for InvalidStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid attendance status `{}`; expected P|T|J|A", self.0)
    }
}

impl Error for InvalidStatus {}
