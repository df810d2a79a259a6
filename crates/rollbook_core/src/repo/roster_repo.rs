//! Roster store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist classes and their enrolled students.
//! - Serve the student identity reads the attendance core depends on.
//!
//! # Invariants
//! - A class's scope and owner never change after creation.
//! - `list_students` is ordered by last name, then first name, then id.
//! - Names and student numbers are trimmed and must not be blank.

use crate::model::class_ref::{Class, ClassRef, ClassScope};
use crate::model::student::{Student, StudentId};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::schema::ensure_connection_ready;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const STUDENT_SELECT_SQL: &str = "SELECT
    student_uuid,
    external_id,
    last_name,
    first_name
FROM students";

/// Input for enrolling or editing one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentInput {
    pub external_id: String,
    pub last_name: String,
    pub first_name: String,
}

impl StudentInput {
    pub fn new(
        external_id: impl Into<String>,
        last_name: impl Into<String>,
        first_name: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            last_name: last_name.into(),
            first_name: first_name.into(),
        }
    }

    fn normalized(&self) -> RepoResult<Self> {
        Ok(Self {
            external_id: normalize_required("external_id", &self.external_id)?,
            last_name: normalize_required("last_name", &self.last_name)?,
            first_name: normalize_required("first_name", &self.first_name)?,
        })
    }
}

/// Repository interface for class rosters.
pub trait RosterStore {
    /// Creates one class and returns its handle.
    fn create_class(&self, scope: ClassScope, name: &str) -> RepoResult<Class>;
    /// Loads one class, `None` when missing or addressed with another scope.
    fn get_class(&self, class_ref: &ClassRef) -> RepoResult<Option<Class>>;
    /// Renames one class. Scope is not editable.
    fn rename_class(&self, class_ref: &ClassRef, name: &str) -> RepoResult<()>;
    /// Enrolls one student.
    fn add_student(&self, class_ref: &ClassRef, input: &StudentInput) -> RepoResult<Student>;
    /// Replaces a student's identity fields.
    fn update_student(
        &self,
        class_ref: &ClassRef,
        student_id: StudentId,
        input: &StudentInput,
    ) -> RepoResult<Student>;
    /// Removes one student from the roster. Recorded attendance is kept.
    fn remove_student(&self, class_ref: &ClassRef, student_id: StudentId) -> RepoResult<()>;
    /// Lists the roster ordered by last name ascending.
    fn list_students(&self, class_ref: &ClassRef) -> RepoResult<Vec<Student>>;
    /// Loads one student of the class.
    fn get_student(
        &self,
        class_ref: &ClassRef,
        student_id: StudentId,
    ) -> RepoResult<Option<Student>>;
}

/// SQLite-backed roster store.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["classes", "students"])?;
        Ok(Self { conn })
    }
}

impl RosterStore for SqliteRosterRepository<'_> {
    fn create_class(&self, scope: ClassScope, name: &str) -> RepoResult<Class> {
        let name = normalize_required("name", name)?;
        if let ClassScope::Personal { owner_id } = &scope {
            normalize_required("owner_id", owner_id)?;
        }

        let class_ref = ClassRef {
            id: Uuid::new_v4(),
            scope,
        };
        self.conn.execute(
            "INSERT INTO classes (class_uuid, scope, owner_id, name)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                class_ref.id.to_string(),
                class_ref.scope.tag(),
                class_ref.scope.owner_id(),
                name,
            ],
        )?;

        self.get_class(&class_ref)?.ok_or_else(|| {
            RepoError::InvalidData(format!("class {} missing after insert", class_ref.id))
        })
    }

    fn get_class(&self, class_ref: &ClassRef) -> RepoResult<Option<Class>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, created_at, updated_at
                 FROM classes
                 WHERE class_uuid = ?1
                   AND scope = ?2
                   AND owner_id IS ?3;",
                params![
                    class_ref.id.to_string(),
                    class_ref.scope.tag(),
                    class_ref.scope.owner_id(),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(name, created_at, updated_at)| Class {
            class_ref: class_ref.clone(),
            name,
            created_at,
            updated_at,
        }))
    }

    fn rename_class(&self, class_ref: &ClassRef, name: &str) -> RepoResult<()> {
        let name = normalize_required("name", name)?;
        let changed = self.conn.execute(
            "UPDATE classes
             SET name = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE class_uuid = ?1
               AND scope = ?2
               AND owner_id IS ?3;",
            params![
                class_ref.id.to_string(),
                class_ref.scope.tag(),
                class_ref.scope.owner_id(),
                name,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ClassNotFound(class_ref.id));
        }
        Ok(())
    }

    fn add_student(&self, class_ref: &ClassRef, input: &StudentInput) -> RepoResult<Student> {
        let input = input.normalized()?;
        ensure_class_exists(self.conn, class_ref)?;

        let student_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO students (student_uuid, class_uuid, external_id, last_name, first_name)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                student_id.to_string(),
                class_ref.id.to_string(),
                input.external_id,
                input.last_name,
                input.first_name,
            ],
        )?;

        Ok(Student {
            id: student_id,
            external_id: input.external_id,
            last_name: input.last_name,
            first_name: input.first_name,
        })
    }

    fn update_student(
        &self,
        class_ref: &ClassRef,
        student_id: StudentId,
        input: &StudentInput,
    ) -> RepoResult<Student> {
        let input = input.normalized()?;
        ensure_class_exists(self.conn, class_ref)?;

        let changed = self.conn.execute(
            "UPDATE students
             SET external_id = ?3,
                 last_name = ?4,
                 first_name = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE student_uuid = ?1
               AND class_uuid = ?2;",
            params![
                student_id.to_string(),
                class_ref.id.to_string(),
                input.external_id,
                input.last_name,
                input.first_name,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::StudentNotFound(student_id));
        }

        Ok(Student {
            id: student_id,
            external_id: input.external_id,
            last_name: input.last_name,
            first_name: input.first_name,
        })
    }

    fn remove_student(&self, class_ref: &ClassRef, student_id: StudentId) -> RepoResult<()> {
        ensure_class_exists(self.conn, class_ref)?;
        let changed = self.conn.execute(
            "DELETE FROM students WHERE student_uuid = ?1 AND class_uuid = ?2;",
            params![student_id.to_string(), class_ref.id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::StudentNotFound(student_id));
        }
        Ok(())
    }

    fn list_students(&self, class_ref: &ClassRef) -> RepoResult<Vec<Student>> {
        ensure_class_exists(self.conn, class_ref)?;
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE class_uuid = ?1
             ORDER BY last_name COLLATE NOCASE ASC,
                      first_name COLLATE NOCASE ASC,
                      student_uuid ASC;"
        ))?;
        let mut rows = stmt.query([class_ref.id.to_string()])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn get_student(
        &self,
        class_ref: &ClassRef,
        student_id: StudentId,
    ) -> RepoResult<Option<Student>> {
        ensure_class_exists(self.conn, class_ref)?;
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE student_uuid = ?1
               AND class_uuid = ?2;"
        ))?;
        let mut rows = stmt.query(params![student_id.to_string(), class_ref.id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(row)?));
        }
        Ok(None)
    }
}

/// Fails with `ClassNotFound` unless `class_ref` names a stored class with the
/// same scope and owner.
pub(crate) fn ensure_class_exists(conn: &Connection, class_ref: &ClassRef) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM classes
            WHERE class_uuid = ?1
              AND scope = ?2
              AND owner_id IS ?3
        );",
        params![
            class_ref.id.to_string(),
            class_ref.scope.tag(),
            class_ref.scope.owner_id(),
        ],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::ClassNotFound(class_ref.id));
    }
    Ok(())
}

fn parse_student_row(row: &Row<'_>) -> RepoResult<Student> {
    let id_text: String = row.get("student_uuid")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid `{id_text}` in students.student_uuid"
        ))
    })?;
    Ok(Student {
        id,
        external_id: row.get("external_id")?,
        last_name: row.get("last_name")?,
        first_name: row.get("first_name")?,
    })
}

fn normalize_required(field: &str, value: &str) -> RepoResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidInput(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}
