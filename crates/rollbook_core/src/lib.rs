//! Attendance core for class registers.
//! This crate owns slot allocation and the consistency between a session's
//! counts and its per-student records.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{BootstrapError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::class_ref::{Class, ClassId, ClassRef, ClassScope};
pub use model::session::{
    AttendanceSession, SessionDate, SessionId, SessionValidationError, Slot, StatusCounts,
    StudentRecord, StudentStatuses, MAX_SLOTS,
};
pub use model::status::{next_status_code, AttendanceStatus, InvalidStatus};
pub use model::student::{Student, StudentId};
pub use repo::error::{RepoError, RepoResult};
pub use repo::roster_repo::{RosterStore, SqliteRosterRepository, StudentInput};
pub use repo::session_repo::{
    SessionRepository, SessionWrite, SqliteSessionRepository, WriteKind,
};
pub use service::error::AttendanceError;
pub use service::events::{SessionEvent, SessionEventHub};
pub use service::report::{
    filter_records, parse_status_filter, resolve_records, AttendanceReport, ResolvedRecord,
};
pub use service::session_service::SessionService;
pub use service::slot_allocator::{free_slots, SlotAllocator};
pub use service::workflow::{
    seed_rows, AttendanceDraft, AttendanceWorkflow, DraftMode, DraftRow,
};

/// Minimal health-check API for embedding callers.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
