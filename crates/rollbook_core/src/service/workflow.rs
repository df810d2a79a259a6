//! New/edit/copy attendance drafts.
//!
//! # Responsibility
//! - Build an in-memory draft from the current roster, overlaying stored
//!   statuses when editing or copying.
//! - Track the date, the proposed slot and the free slots for that date.
//! - Commit through `SessionService`, which owns every write.
//!
//! # Invariants
//! - Draft rows follow roster order; every roster student has one status.
//! - Students absent from the overlaid records start as Present.
//! - The slot shown to the caller is always one of `available_slots`, or
//!   `None` when the date is full.

use crate::model::class_ref::ClassRef;
use crate::model::session::{
    AttendanceSession, SessionDate, SessionId, Slot, StudentRecord, StudentStatuses,
};
use crate::model::status::AttendanceStatus;
use crate::model::student::{Student, StudentId};
use crate::repo::roster_repo::RosterStore;
use crate::repo::session_repo::SessionRepository;
use crate::service::error::AttendanceError;
use crate::service::session_service::SessionService;
use std::collections::HashMap;

/// What a draft commits as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftMode {
    New,
    Edit(SessionId),
    Copy(SessionId),
}

/// One roster student and the status being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRow {
    pub student: Student,
    pub status: AttendanceStatus,
}

/// Editable attendance sheet before commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceDraft {
    class_ref: ClassRef,
    mode: DraftMode,
    date: SessionDate,
    slot: Option<Slot>,
    available_slots: Vec<Slot>,
    rows: Vec<DraftRow>,
}

impl AttendanceDraft {
    pub fn class_ref(&self) -> &ClassRef {
        &self.class_ref
    }

    pub fn mode(&self) -> DraftMode {
        self.mode
    }

    pub fn date(&self) -> SessionDate {
        self.date
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn available_slots(&self) -> &[Slot] {
        &self.available_slots
    }

    pub fn rows(&self) -> &[DraftRow] {
        &self.rows
    }

    /// Current status of every row, keyed by student.
    pub fn statuses(&self) -> StudentStatuses {
        self.rows
            .iter()
            .map(|row| (row.student.id, row.status))
            .collect()
    }

    /// Advances one student's status through the cycle and returns it.
    pub fn toggle(&mut self, student_id: StudentId) -> Result<AttendanceStatus, AttendanceError> {
        let row = self.row_mut(student_id)?;
        row.status = row.status.next();
        Ok(row.status)
    }

    pub fn set_status(
        &mut self,
        student_id: StudentId,
        status: AttendanceStatus,
    ) -> Result<(), AttendanceError> {
        self.row_mut(student_id)?.status = status;
        Ok(())
    }

    /// Picks a slot from the free slots of the current date.
    ///
    /// # Errors
    /// - `SlotConflict` when `slot` is not currently free.
    pub fn select_slot(&mut self, slot: Slot) -> Result<(), AttendanceError> {
        if !self.available_slots.contains(&slot) {
            return Err(AttendanceError::SlotConflict {
                class_id: self.class_ref.id,
                date: self.date,
                slot,
            });
        }
        self.slot = Some(slot);
        Ok(())
    }

    fn row_mut(&mut self, student_id: StudentId) -> Result<&mut DraftRow, AttendanceError> {
        self.rows
            .iter_mut()
            .find(|row| row.student.id == student_id)
            .ok_or(AttendanceError::StudentNotFound(student_id))
    }

    fn excluded_session(&self) -> Option<SessionId> {
        match self.mode {
            DraftMode::Edit(session_id) => Some(session_id),
            DraftMode::New | DraftMode::Copy(_) => None,
        }
    }

    fn apply_available_slots(&mut self, available: Vec<Slot>) {
        let keep_current = matches!(self.mode, DraftMode::Edit(_))
            && self.slot.is_some_and(|slot| available.contains(&slot));
        if !keep_current {
            self.slot = available.first().copied();
        }
        self.available_slots = available;
    }
}

/// Overlays recorded statuses on the roster.
///
/// Roster students with a record keep its status; the rest start as Present.
/// Students no longer on the roster get no row; committing an edit keeps
/// their stored records.
pub fn seed_rows(roster: Vec<Student>, recorded: &[StudentRecord]) -> Vec<DraftRow> {
    let by_student = recorded
        .iter()
        .map(|record| (record.student_id, record.status))
        .collect::<HashMap<_, _>>();
    roster
        .into_iter()
        .map(|student| {
            let status = by_student.get(&student.id).copied().unwrap_or_default();
            DraftRow { student, status }
        })
        .collect()
}

/// Orchestrates drafts on top of a session service.
pub struct AttendanceWorkflow<'svc, S: SessionRepository, R: RosterStore> {
    service: &'svc SessionService<S, R>,
}

impl<'svc, S: SessionRepository, R: RosterStore> AttendanceWorkflow<'svc, S, R> {
    pub fn new(service: &'svc SessionService<S, R>) -> Self {
        Self { service }
    }

    /// Fresh sheet for `date`: everyone Present, lowest free slot proposed.
    pub fn new_draft(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
    ) -> Result<AttendanceDraft, AttendanceError> {
        let rows = seed_rows(self.service.roster(class_ref)?, &[]);
        self.build(class_ref, DraftMode::New, date, None, rows)
    }

    /// Sheet for editing a stored session on its own date and slot.
    pub fn edit_draft(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> Result<AttendanceDraft, AttendanceError> {
        let (session, records) = self.service.load_with_records(class_ref, session_id)?;
        let rows = seed_rows(self.service.roster(class_ref)?, &records);
        self.build(
            class_ref,
            DraftMode::Edit(session_id),
            session.date,
            Some(session.slot),
            rows,
        )
    }

    /// Sheet seeded from `source_id`'s statuses with a freshly proposed slot.
    ///
    /// Targets `date` when given, otherwise the source session's date.
    pub fn copy_draft(
        &self,
        class_ref: &ClassRef,
        source_id: SessionId,
        date: Option<SessionDate>,
    ) -> Result<AttendanceDraft, AttendanceError> {
        let (source, records) = self.service.load_with_records(class_ref, source_id)?;
        let rows = seed_rows(self.service.roster(class_ref)?, &records);
        self.build(
            class_ref,
            DraftMode::Copy(source_id),
            date.unwrap_or(source.date),
            None,
            rows,
        )
    }

    /// Moves the draft to another date and refreshes its free slots.
    pub fn change_date(
        &self,
        draft: &mut AttendanceDraft,
        date: SessionDate,
    ) -> Result<(), AttendanceError> {
        let available =
            self.service
                .available_slots(&draft.class_ref, date, draft.excluded_session())?;
        draft.date = date;
        draft.apply_available_slots(available);
        Ok(())
    }

    /// Persists the draft.
    ///
    /// # Errors
    /// - `NoSlotsAvailable` when the draft date has no free slot.
    /// - `SlotConflict` when another writer took the slot since the draft
    ///   was built; refresh with [`Self::change_date`] and retry.
    pub fn commit(&self, draft: &AttendanceDraft) -> Result<AttendanceSession, AttendanceError> {
        let slot = draft.slot.ok_or(AttendanceError::NoSlotsAvailable {
            class_id: draft.class_ref.id,
            date: draft.date,
        })?;
        let statuses = draft.statuses();
        match draft.mode {
            DraftMode::New => self
                .service
                .create(&draft.class_ref, draft.date, slot, &statuses),
            DraftMode::Edit(session_id) => {
                self.service
                    .update(&draft.class_ref, session_id, draft.date, slot, &statuses)
            }
            DraftMode::Copy(source_id) => {
                self.service
                    .copy(&draft.class_ref, source_id, draft.date, slot, &statuses)
            }
        }
    }

    fn build(
        &self,
        class_ref: &ClassRef,
        mode: DraftMode,
        date: SessionDate,
        slot: Option<Slot>,
        rows: Vec<DraftRow>,
    ) -> Result<AttendanceDraft, AttendanceError> {
        let mut draft = AttendanceDraft {
            class_ref: class_ref.clone(),
            mode,
            date,
            slot,
            available_slots: Vec::new(),
            rows,
        };
        self.change_date(&mut draft, date)?;
        Ok(draft)
    }
}
