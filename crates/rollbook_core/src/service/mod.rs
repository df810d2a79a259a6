//! Attendance use-case services.
//!
//! # Responsibility
//! - Allocate slots, derive counts, and persist sessions through the single
//!   combined repository write.
//! - Build new/edit/copy drafts and filtered reports for callers.
//!
//! # Invariants
//! - `SessionService` is the only writer of sessions and records.
//! - Counts are recomputed from statuses on every write.

pub mod error;
pub mod events;
pub mod report;
pub mod session_service;
pub mod slot_allocator;
pub mod workflow;
