//! Free-slot computation for one class and date.
//!
//! The allocator only proposes slots. Two callers can both see a slot as
//! free; the combined repository write decides the winner.

use crate::model::class_ref::ClassRef;
use crate::model::session::{AttendanceSession, SessionDate, SessionId, Slot};
use crate::repo::session_repo::SessionRepository;
use crate::service::error::AttendanceError;
use std::collections::BTreeSet;

/// Returns `1..=MAX_SLOTS` minus the slots used on `date`, ascending.
///
/// `exclude` drops one session from the used set so an edited session does
/// not block its own slot.
pub fn free_slots(
    sessions: &[AttendanceSession],
    date: SessionDate,
    exclude: Option<SessionId>,
) -> Vec<Slot> {
    let used = sessions
        .iter()
        .filter(|session| session.date == date && Some(session.id) != exclude)
        .map(|session| session.slot)
        .collect::<BTreeSet<_>>();
    Slot::all().filter(|slot| !used.contains(slot)).collect()
}

/// Reads a class's sessions and computes its free slots.
pub struct SlotAllocator<'repo, S: SessionRepository + ?Sized> {
    sessions: &'repo S,
}

impl<'repo, S: SessionRepository + ?Sized> SlotAllocator<'repo, S> {
    pub fn new(sessions: &'repo S) -> Self {
        Self { sessions }
    }

    /// Free slots of `date`, ascending. Empty when the day is full.
    pub fn available_slots(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
        exclude: Option<SessionId>,
    ) -> Result<Vec<Slot>, AttendanceError> {
        let sessions = self.sessions.list_sessions_on(class_ref, date)?;
        Ok(free_slots(&sessions, date, exclude))
    }

    /// Lowest free slot of `date`.
    ///
    /// # Errors
    /// - `NoSlotsAvailable` when all slots are taken.
    pub fn propose_slot(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
    ) -> Result<Slot, AttendanceError> {
        self.available_slots(class_ref, date, None)?
            .first()
            .copied()
            .ok_or(AttendanceError::NoSlotsAvailable {
                class_id: class_ref.id,
                date,
            })
    }
}
