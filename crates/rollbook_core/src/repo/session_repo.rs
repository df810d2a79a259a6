//! Attendance session repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Read sessions and their per-student records scoped by class.
//! - Provide the single combined write for a session header plus records.
//!
//! # Invariants
//! - `write_session_and_records` runs in one IMMEDIATE transaction: readers
//!   never observe a header without its records, and a dropped transaction
//!   leaves nothing behind.
//! - The `(class, date, slot)` check runs inside that transaction, and the
//!   unique index turns any remaining race into `SlotConflict`.
//! - Header counts are validated against the record set before any SQL runs.
//! - Every record names a student on the class roster or, for updates, a
//!   student already recorded in that session; checked inside the write
//!   transaction.
//! - Deleting a session cascades to its records.

use crate::db::DbError;
use crate::model::class_ref::ClassRef;
use crate::model::session::{
    validate_records, AttendanceSession, SessionDate, SessionId, Slot, StatusCounts,
    StudentRecord,
};
use crate::model::status::AttendanceStatus;
use crate::repo::error::{is_unique_violation, RepoError, RepoResult};
use crate::repo::roster_repo::ensure_class_exists;
use crate::repo::schema::ensure_connection_ready;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const SESSION_SELECT_SQL: &str = "SELECT
    session_uuid,
    session_date,
    slot,
    present_count,
    late_count,
    justified_count,
    absent_count,
    created_at,
    updated_at
FROM attendance_sessions";

/// Whether a combined write inserts a new session or overwrites one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

/// Session header plus its full record set, written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWrite {
    pub kind: WriteKind,
    pub session_id: SessionId,
    pub class_ref: ClassRef,
    pub date: SessionDate,
    pub slot: Slot,
    pub counts: StatusCounts,
    pub records: Vec<StudentRecord>,
}

/// Repository interface for attendance sessions.
pub trait SessionRepository {
    /// Lists every session of the class, newest date first, then highest slot.
    fn list_sessions(&self, class_ref: &ClassRef) -> RepoResult<Vec<AttendanceSession>>;
    /// Lists sessions of the class on one date, ordered by slot.
    fn list_sessions_on(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
    ) -> RepoResult<Vec<AttendanceSession>>;
    /// Loads one session header.
    fn get_session(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> RepoResult<Option<AttendanceSession>>;
    /// Lists the records of one session ordered by student id.
    fn list_records(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> RepoResult<Vec<StudentRecord>>;
    /// Atomically writes a session header and replaces its record set.
    ///
    /// With `expect_slot_free`, fails with `SlotConflict` when another session
    /// of the class already holds `(date, slot)`; the check and the write
    /// share one transaction.
    ///
    /// Fails with `StudentNotFound` when a record names a student that is
    /// neither on the roster nor already recorded in the updated session.
    fn write_session_and_records(
        &self,
        write: &SessionWrite,
        expect_slot_free: bool,
    ) -> RepoResult<AttendanceSession>;
    /// Deletes one session and its records.
    fn delete_session(&self, class_ref: &ClassRef, session_id: SessionId) -> RepoResult<()>;
}

/// SQLite-backed session repository.
pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["classes", "attendance_sessions", "student_records"])?;
        Ok(Self { conn })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn list_sessions(&self, class_ref: &ClassRef) -> RepoResult<Vec<AttendanceSession>> {
        ensure_class_exists(self.conn, class_ref)?;
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             WHERE class_uuid = ?1
             ORDER BY session_date DESC, slot DESC;"
        ))?;
        let mut rows = stmt.query([class_ref.id.to_string()])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row, class_ref)?);
        }
        Ok(sessions)
    }

    fn list_sessions_on(
        &self,
        class_ref: &ClassRef,
        date: SessionDate,
    ) -> RepoResult<Vec<AttendanceSession>> {
        ensure_class_exists(self.conn, class_ref)?;
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             WHERE class_uuid = ?1
               AND session_date = ?2
             ORDER BY slot ASC;"
        ))?;
        let mut rows = stmt.query(params![class_ref.id.to_string(), date.key()])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row, class_ref)?);
        }
        Ok(sessions)
    }

    fn get_session(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> RepoResult<Option<AttendanceSession>> {
        ensure_class_exists(self.conn, class_ref)?;
        load_session(self.conn, class_ref, session_id)
    }

    fn list_records(
        &self,
        class_ref: &ClassRef,
        session_id: SessionId,
    ) -> RepoResult<Vec<StudentRecord>> {
        ensure_class_exists(self.conn, class_ref)?;
        if load_session(self.conn, class_ref, session_id)?.is_none() {
            return Err(RepoError::SessionNotFound(session_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT student_uuid, status
             FROM student_records
             WHERE session_uuid = ?1
             ORDER BY student_uuid ASC;",
        )?;
        let mut rows = stmt.query([session_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn write_session_and_records(
        &self,
        write: &SessionWrite,
        expect_slot_free: bool,
    ) -> RepoResult<AttendanceSession> {
        validate_records(&write.counts, &write.records)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_class_exists(&tx, &write.class_ref)?;

        if expect_slot_free && slot_taken_by_other(&tx, write)? {
            return Err(slot_conflict(write));
        }

        let result = match write.kind {
            WriteKind::Create => insert_session(&tx, write),
            WriteKind::Update => update_session(&tx, write),
        };
        match result {
            Ok(()) => {}
            Err(RepoError::Db(DbError::Sqlite(err))) if is_unique_violation(&err) => {
                return Err(slot_conflict(write));
            }
            Err(err) => return Err(err),
        }

        ensure_record_owners(&tx, write)?;
        replace_records(&tx, write)?;

        let stored = load_session(&tx, &write.class_ref, write.session_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "attendance session {} missing after write",
                write.session_id
            ))
        })?;
        tx.commit()?;
        Ok(stored)
    }

    fn delete_session(&self, class_ref: &ClassRef, session_id: SessionId) -> RepoResult<()> {
        ensure_class_exists(self.conn, class_ref)?;
        let changed = self.conn.execute(
            "DELETE FROM attendance_sessions
             WHERE session_uuid = ?1
               AND class_uuid = ?2;",
            params![session_id.to_string(), class_ref.id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::SessionNotFound(session_id));
        }
        Ok(())
    }
}

fn slot_conflict(write: &SessionWrite) -> RepoError {
    RepoError::SlotConflict {
        class_id: write.class_ref.id,
        date: write.date,
        slot: write.slot,
    }
}

fn slot_taken_by_other(conn: &Connection, write: &SessionWrite) -> RepoResult<bool> {
    let taken: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM attendance_sessions
            WHERE class_uuid = ?1
              AND session_date = ?2
              AND slot = ?3
              AND session_uuid != ?4
        );",
        params![
            write.class_ref.id.to_string(),
            write.date.key(),
            write.slot.get(),
            write.session_id.to_string(),
        ],
        |row| row.get(0),
    )?;
    Ok(taken == 1)
}

fn insert_session(conn: &Connection, write: &SessionWrite) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO attendance_sessions (
            session_uuid,
            class_uuid,
            session_date,
            local_midnight_ms,
            slot,
            present_count,
            late_count,
            justified_count,
            absent_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            write.session_id.to_string(),
            write.class_ref.id.to_string(),
            write.date.key(),
            write.date.local_midnight_epoch_ms(),
            write.slot.get(),
            write.counts.present(),
            write.counts.late(),
            write.counts.justified(),
            write.counts.absent(),
        ],
    )?;
    Ok(())
}

fn update_session(conn: &Connection, write: &SessionWrite) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE attendance_sessions
         SET session_date = ?3,
             local_midnight_ms = ?4,
             slot = ?5,
             present_count = ?6,
             late_count = ?7,
             justified_count = ?8,
             absent_count = ?9,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE session_uuid = ?1
           AND class_uuid = ?2;",
        params![
            write.session_id.to_string(),
            write.class_ref.id.to_string(),
            write.date.key(),
            write.date.local_midnight_epoch_ms(),
            write.slot.get(),
            write.counts.present(),
            write.counts.late(),
            write.counts.justified(),
            write.counts.absent(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::SessionNotFound(write.session_id));
    }
    Ok(())
}

fn ensure_record_owners(conn: &Connection, write: &SessionWrite) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
                SELECT 1 FROM students
                WHERE student_uuid = ?1
                  AND class_uuid = ?2
            )
            OR EXISTS(
                SELECT 1 FROM student_records
                WHERE student_uuid = ?1
                  AND session_uuid = ?3
            );",
    )?;
    let class_uuid = write.class_ref.id.to_string();
    let session_uuid = write.session_id.to_string();
    for record in &write.records {
        let known: bool = stmt.query_row(
            params![
                record.student_id.to_string(),
                class_uuid.as_str(),
                session_uuid.as_str(),
            ],
            |row| row.get(0),
        )?;
        if !known {
            return Err(RepoError::StudentNotFound(record.student_id));
        }
    }
    Ok(())
}

fn replace_records(conn: &Connection, write: &SessionWrite) -> RepoResult<()> {
    let session_uuid = write.session_id.to_string();
    conn.execute(
        "DELETE FROM student_records WHERE session_uuid = ?1;",
        [session_uuid.as_str()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO student_records (session_uuid, student_uuid, status)
         VALUES (?1, ?2, ?3);",
    )?;
    for record in &write.records {
        stmt.execute(params![
            session_uuid.as_str(),
            record.student_id.to_string(),
            record.status.code(),
        ])?;
    }
    Ok(())
}

fn load_session(
    conn: &Connection,
    class_ref: &ClassRef,
    session_id: SessionId,
) -> RepoResult<Option<AttendanceSession>> {
    let mut stmt = conn.prepare(&format!(
        "{SESSION_SELECT_SQL}
         WHERE session_uuid = ?1
           AND class_uuid = ?2;"
    ))?;
    let mut rows = stmt.query(params![session_id.to_string(), class_ref.id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_session_row(row, class_ref)?));
    }
    Ok(None)
}

fn parse_session_row(row: &Row<'_>, class_ref: &ClassRef) -> RepoResult<AttendanceSession> {
    let id_text: String = row.get("session_uuid")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid `{id_text}` in attendance_sessions.session_uuid"
        ))
    })?;

    let date_text: String = row.get("session_date")?;
    let date = SessionDate::parse(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in attendance_sessions.session_date"
        ))
    })?;

    let slot_value: i64 = row.get("slot")?;
    let slot = Slot::try_from(slot_value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid slot `{slot_value}` in attendance_sessions.slot"
        ))
    })?;

    Ok(AttendanceSession {
        id,
        class_ref: class_ref.clone(),
        date,
        slot,
        counts: StatusCounts::from_stored(
            row.get("present_count")?,
            row.get("late_count")?,
            row.get("justified_count")?,
            row.get("absent_count")?,
        ),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<StudentRecord> {
    let id_text: String = row.get("student_uuid")?;
    let student_id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid `{id_text}` in student_records.student_uuid"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = AttendanceStatus::from_code(&status_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in student_records.status"
        ))
    })?;

    Ok(StudentRecord { student_id, status })
}
