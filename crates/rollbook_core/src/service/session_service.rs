//! Attendance session use-case service.
//!
//! # Responsibility
//! - Be the only writer of attendance sessions and their student records.
//! - Derive counts from statuses and hand header plus records to the
//!   repository as one combined write.
//! - Serve history, session loads and reports.
//!
//! # Invariants
//! - Counts are tallied from the submitted statuses on every write.
//! - Every write re-validates slot uniqueness at commit time; a lost race
//!   surfaces as `SlotConflict`.
//! - Statuses may only name students on the class roster, or students already
//!   recorded in the session being updated; the repository checks this inside
//!   the write transaction.
//! - Updates never drop the stored record of a student who left the roster.
//! - `created_at` is never rewritten by updates.

use crate::model::class_ref::ClassRef;
use crate::model::session::{
    records_from_statuses, AttendanceSession, SessionDate, SessionId, Slot, StatusCounts,
    StudentRecord, StudentStatuses,
};
use crate::model::student::Student;
use crate::repo::error::RepoError;
use crate::repo::roster_repo::RosterStore;
use crate::repo::session_repo::{SessionRepository, SessionWrite, WriteKind};
use crate::service::error::AttendanceError;
use crate::service::events::{SessionEvent, SessionEventHub};
use crate::service::report::{resolve_records, AttendanceReport};
use crate::service::slot_allocator::SlotAllocator;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Use-case service for attendance sessions.
pub struct SessionService<S: SessionRepository, R: RosterStore> {
    sessions: S,
    roster: R,
    events: Option<Arc<SessionEventHub>>,
}

impl<S: SessionRepository, R: RosterStore> SessionService<S, R> {
    /// Creates a service from session and roster repositories.
    pub fn new(sessions: S, roster: R) -> Self {
        Self {
            sessions,
            roster,
            events: None,
        }
    }

    /// Publishes committed writes and deletes to `hub`.
    pub fn with_events(mut self, hub: Arc<SessionEventHub>) -> Self {
        self.events = Some(hub);
        self
    }

    /// Free slots of `date`, ascending; `exclude` lets an edited session keep
    /// its own slot.
    pub fn available_slots(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
        exclude: Option<SessionId>,
    ) -> Result<Vec<Slot>, AttendanceError> {
        SlotAllocator::new(&self.sessions).available_slots(class_ref, date, exclude)
    }

    /// Lowest free slot of `date`, or `NoSlotsAvailable`.
    pub fn propose_slot(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
    ) -> Result<Slot, AttendanceError> {
        SlotAllocator::new(&self.sessions).propose_slot(class_ref, date)
    }

    /// Creates a session with one record per entry of `statuses`.
    ///
    /// # Errors
    /// - `SlotConflict` when `(class, date, slot)` is taken at commit time.
    /// - `StudentNotFound` when a status names a student not on the roster.
    pub fn create(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
        slot: Slot,
        statuses: &StudentStatuses,
    ) -> Result<AttendanceSession, AttendanceError> {
        self.persist(
            "create",
            WriteKind::Create,
            Uuid::new_v4(),
            class_ref,
            date,
            slot,
            statuses,
        )
    }

    /// Overwrites date, slot, counts and the record set of a session.
    ///
    /// Roster students missing from `statuses` lose their record. Stored
    /// records of students who have left the roster are kept unless
    /// `statuses` sets them again, and counts are tallied over the merged set.
    pub fn update(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
        date: SessionDate,
        slot: Slot,
        statuses: &StudentStatuses,
    ) -> Result<AttendanceSession, AttendanceError> {
        let stored = self.sessions.list_records(class_ref, session_id)?;
        let merged = self.merge_departed(class_ref, stored, statuses)?;
        self.persist(
            "update",
            WriteKind::Update,
            session_id,
            class_ref,
            date,
            slot,
            &merged,
        )
    }

    /// Creates a new session seeded from `source_id`.
    ///
    /// Behaves like [`Self::create`] once the source is confirmed to exist;
    /// seeding itself happens in the copy draft.
    pub fn copy(
        &self,
        class_ref: &ClassRef,
        source_id: SessionId,
        date: SessionDate,
        slot: Slot,
        statuses: &StudentStatuses,
    ) -> Result<AttendanceSession, AttendanceError> {
        self.get_session(class_ref, source_id)?;
        self.persist(
            "copy",
            WriteKind::Create,
            Uuid::new_v4(),
            class_ref,
            date,
            slot,
            statuses,
        )
    }

    /// Deletes a session and its records.
    pub fn delete(&self, class_ref: &ClassRef, session_id: SessionId) -> Result<(), AttendanceError> {
        self.sessions.delete_session(class_ref, session_id)?;
        info!(
            "event=session_delete module=service status=ok class_id={} session_id={}",
            class_ref.id, session_id
        );
        self.publish(SessionEvent::Deleted {
            class_id: class_ref.id,
            session_id,
        });
        Ok(())
    }

    /// Sessions of the class, newest date first, then highest slot.
    pub fn history(&self, class_ref: &ClassRef) -> Result<Vec<AttendanceSession>, AttendanceError> {
        Ok(self.sessions.list_sessions(class_ref)?)
    }

    /// Loads one session header.
    pub fn get_session(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> Result<AttendanceSession, AttendanceError> {
        self.sessions
            .get_session(class_ref, session_id)?
            .ok_or(AttendanceError::SessionNotFound(session_id))
    }

    /// Loads a session with its records and checks that the stored counts
    /// match the stored records.
    pub fn load_with_records(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> Result<(AttendanceSession, Vec<StudentRecord>), AttendanceError> {
        let session = self.get_session(class_ref, session_id)?;
        let records = self.sessions.list_records(class_ref, session_id)?;
        let tallied = StatusCounts::tally(records.iter().map(|record| record.status));
        if tallied != session.counts {
            error!(
                "event=session_load module=service status=error error_code=counts_mismatch class_id={} session_id={}",
                class_ref.id, session_id
            );
            return Err(AttendanceError::InconsistentState(format!(
                "session {session_id} stores counts {} but records tally {tallied}",
                session.counts
            )));
        }
        Ok((session, records))
    }

    /// Current roster of the class, ordered by last name.
    pub fn roster(&self, class_ref: &ClassRef) -> Result<Vec<Student>, AttendanceError> {
        Ok(self.roster.list_students(class_ref)?)
    }

    /// Session header plus records joined with roster names.
    pub fn report(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> Result<AttendanceReport, AttendanceError> {
        let (session, records) = self.load_with_records(class_ref, session_id)?;
        let roster = self.roster(class_ref)?;
        Ok(AttendanceReport {
            session,
            rows: resolve_records(&records, &roster),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        op: &'static str,
        kind: WriteKind,
        session_id: SessionId,
        class_ref: &ClassRef,
        date: SessionDate,
        slot: Slot,
        statuses: &StudentStatuses,
    ) -> Result<AttendanceSession, AttendanceError> {
        let started_at = Instant::now();

        let write = SessionWrite {
            kind,
            session_id,
            class_ref: class_ref.clone(),
            date,
            slot,
            counts: StatusCounts::tally(statuses.values().copied()),
            records: records_from_statuses(statuses),
        };

        match self.sessions.write_session_and_records(&write, true) {
            Ok(session) => {
                info!(
                    "event=session_write module=service status=ok op={op} class_id={} session_id={} date={} slot={} students={} duration_ms={}",
                    class_ref.id,
                    session.id,
                    date,
                    slot,
                    write.records.len(),
                    started_at.elapsed().as_millis()
                );
                self.publish(SessionEvent::Saved(session.clone()));
                Ok(session)
            }
            Err(err @ RepoError::SlotConflict { .. }) => {
                warn!(
                    "event=session_write module=service status=error op={op} error_code=slot_conflict class_id={} date={} slot={} duration_ms={}",
                    class_ref.id,
                    date,
                    slot,
                    started_at.elapsed().as_millis()
                );
                Err(err.into())
            }
            Err(err) => {
                error!(
                    "event=session_write module=service status=error op={op} error_code=write_failed class_id={} date={} slot={} duration_ms={} error={}",
                    class_ref.id,
                    date,
                    slot,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn merge_departed(
        &self,
        class_ref: &ClassRef,
        stored: Vec<StudentRecord>,
        statuses: &StudentStatuses,
    ) -> Result<StudentStatuses, AttendanceError> {
        let enrolled = self
            .roster
            .list_students(class_ref)?
            .into_iter()
            .map(|student| student.id)
            .collect::<HashSet<_>>();
        let mut merged = statuses.clone();
        for record in stored {
            if !enrolled.contains(&record.student_id) {
                merged.entry(record.student_id).or_insert(record.status);
            }
        }
        Ok(merged)
    }

    fn publish(&self, event: SessionEvent) {
        if let Some(hub) = &self.events {
            hub.publish(event);
        }
    }
}
