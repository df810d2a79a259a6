//! Roster student identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one enrolled student.
pub type StudentId = Uuid;

/// Student as listed in a class roster.
///
/// The attendance core only reads identity fields; roster edits go through
/// [`crate::repo::roster_repo::RosterStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    /// Institution-issued student number.
    pub external_id: String,
    pub last_name: String,
    pub first_name: String,
}
