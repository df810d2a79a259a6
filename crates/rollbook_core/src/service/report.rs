//! Session report rows and status filtering.
//!
//! # Invariants
//! - Filtering never reorders or mutates rows.
//! - Records whose student left the roster still appear, with empty names.

use crate::model::session::{AttendanceSession, StudentRecord};
use crate::model::status::{AttendanceStatus, InvalidStatus};
use crate::model::student::{Student, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored record joined with the student's current identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub student_id: StudentId,
    pub last_name: String,
    pub first_name: String,
    pub status: AttendanceStatus,
}

/// Session header plus its resolved rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub session: AttendanceSession,
    pub rows: Vec<ResolvedRecord>,
}

impl AttendanceReport {
    /// Rows matching `status`, or all rows when `None`.
    pub fn filtered(&self, status: Option<AttendanceStatus>) -> Vec<ResolvedRecord> {
        filter_records(&self.rows, status)
    }
}

/// Returns the rows whose status equals `status`, preserving input order.
/// With `None`, returns every row unchanged.
pub fn filter_records(
    records: &[ResolvedRecord],
    status: Option<AttendanceStatus>,
) -> Vec<ResolvedRecord> {
    match status {
        None => records.to_vec(),
        Some(wanted) => records
            .iter()
            .filter(|record| record.status == wanted)
            .cloned()
            .collect(),
    }
}

/// Parses a report filter selector. Blank means "all statuses".
pub fn parse_status_filter(value: &str) -> Result<Option<AttendanceStatus>, InvalidStatus> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    AttendanceStatus::from_code(value).map(Some)
}

/// Joins records with roster identity.
///
/// Rows are ordered by status code (`A`, `J`, `P`, `T`), then last name,
/// first name and student id.
pub fn resolve_records(records: &[StudentRecord], roster: &[Student]) -> Vec<ResolvedRecord> {
    let by_id = roster
        .iter()
        .map(|student| (student.id, student))
        .collect::<HashMap<_, _>>();

    let mut rows = records
        .iter()
        .map(|record| {
            let (last_name, first_name) = by_id
                .get(&record.student_id)
                .map(|student| (student.last_name.clone(), student.first_name.clone()))
                .unwrap_or_default();
            ResolvedRecord {
                student_id: record.student_id,
                last_name,
                first_name,
                status: record.status,
            }
        })
        .collect::<Vec<_>>();

    rows.sort_by(|left, right| {
        left.status
            .code()
            .cmp(right.status.code())
            .then_with(|| left.last_name.to_lowercase().cmp(&right.last_name.to_lowercase()))
            .then_with(|| left.first_name.to_lowercase().cmp(&right.first_name.to_lowercase()))
            .then_with(|| left.student_id.cmp(&right.student_id))
    });
    rows
}
