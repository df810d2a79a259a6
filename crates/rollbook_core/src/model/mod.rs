//! Domain model for classes, rosters and attendance sessions.
//!
//! # Responsibility
//! - Define the canonical data structures used by the attendance core.
//! - Keep validation of primitive values (slot, date, status) at construction.
//!
//! # Invariants
//! - A session's `counts` are derived from its records, never hand-edited.
//! - Session dates are calendar days without time-of-day or zone.

pub mod class_ref;
pub mod session;
pub mod status;
pub mod student;
