use rollbook_core::db::open_db_in_memory;
use rollbook_core::{
    AttendanceError, AttendanceStatus, AttendanceWorkflow, ClassRef, ClassScope, RepoError,
    RosterStore, SessionDate, SessionEvent, SessionEventHub, SessionRepository, SessionService,
    SessionWrite, Slot, SqliteRosterRepository, SqliteSessionRepository, StatusCounts, Student,
    StudentInput, StudentRecord, StudentStatuses, WriteKind,
};
use rusqlite::{params, Connection};
use std::sync::Arc;
use uuid::Uuid;

type Service<'conn> =
    SessionService<SqliteSessionRepository<'conn>, SqliteRosterRepository<'conn>>;

fn service(conn: &Connection) -> Service<'_> {
    SessionService::new(
        SqliteSessionRepository::try_new(conn).unwrap(),
        SqliteRosterRepository::try_new(conn).unwrap(),
    )
}

fn seed_class(conn: &Connection) -> (ClassRef, Vec<Student>) {
    let roster = SqliteRosterRepository::try_new(conn).unwrap();
    let class = roster.create_class(ClassScope::Institutional, "3rd A").unwrap();
    let students = [
        ("001", "Arias", "Ana"),
        ("002", "Bravo", "Bruno"),
        ("003", "Castro", "Carla"),
        ("004", "Duarte", "Diego"),
    ]
    .into_iter()
    .map(|(external_id, last, first)| {
        roster
            .add_student(&class.class_ref, &StudentInput::new(external_id, last, first))
            .unwrap()
    })
    .collect();
    (class.class_ref, students)
}

fn date(year: i32, month: u32, day: u32) -> SessionDate {
    SessionDate::from_ymd(year, month, day).unwrap()
}

fn slot(value: u8) -> Slot {
    Slot::new(value).unwrap()
}

fn statuses(students: &[Student], values: &[AttendanceStatus]) -> StudentStatuses {
    students
        .iter()
        .zip(values)
        .map(|(student, status)| (student.id, *status))
        .collect()
}

fn scenario_b_statuses(students: &[Student]) -> StudentStatuses {
    statuses(
        students,
        &[
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
            AttendanceStatus::Justified,
        ],
    )
}

#[test]
fn create_derives_counts_from_statuses() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);

    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(2),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    assert_eq!(session.counts.present(), 1);
    assert_eq!(session.counts.absent(), 1);
    assert_eq!(session.counts.late(), 1);
    assert_eq!(session.counts.justified(), 1);
    assert_eq!(session.counts.total(), 4);
    assert_eq!(session.date, date(2024, 3, 1));
    assert_eq!(session.slot, slot(2));

    let (loaded, records) = service.load_with_records(&class_ref, session.id).unwrap();
    assert_eq!(loaded, session);
    assert_eq!(records.len(), 4);
    assert_eq!(
        StatusCounts::tally(records.iter().map(|record| record.status)),
        loaded.counts
    );
}

#[test]
fn stored_date_is_local_midnight_of_the_calendar_day() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let day = date(2024, 3, 1);

    let session = service
        .create(&class_ref, day, slot(1), &scenario_b_statuses(&students))
        .unwrap();

    let (key, instant): (String, i64) = conn
        .query_row(
            "SELECT session_date, local_midnight_ms FROM attendance_sessions WHERE session_uuid = ?1;",
            [session.id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(key, "2024-03-01");
    assert_eq!(instant, day.local_midnight_epoch_ms());
}

#[test]
fn update_recomputes_counts_and_keeps_created_at() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let created = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    conn.execute(
        "UPDATE attendance_sessions SET created_at = 1000 WHERE session_uuid = ?1;",
        params![created.id.to_string()],
    )
    .unwrap();

    let all_absent = statuses(&students, &[AttendanceStatus::Absent; 4]);
    let updated = service
        .update(&class_ref, created.id, date(2024, 3, 4), slot(3), &all_absent)
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, 1000);
    assert_eq!(updated.date, date(2024, 3, 4));
    assert_eq!(updated.slot, slot(3));
    assert_eq!(updated.counts.absent(), 4);
    assert_eq!(updated.counts.present(), 0);
}

#[test]
fn update_with_fewer_students_drops_their_records() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let created = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    let first_two = statuses(
        &students[..2],
        &[AttendanceStatus::Late, AttendanceStatus::Late],
    );
    service
        .update(&class_ref, created.id, created.date, created.slot, &first_two)
        .unwrap();

    let (session, records) = service.load_with_records(&class_ref, created.id).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(session.counts.total(), 2);
    assert_eq!(session.counts.late(), 2);
}

#[test]
fn update_unknown_session_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let missing = Uuid::new_v4();

    let err = service
        .update(
            &class_ref,
            missing,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap_err();
    assert!(matches!(err, AttendanceError::SessionNotFound(id) if id == missing));
}

#[test]
fn statuses_for_students_outside_roster_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let stranger = Uuid::new_v4();

    let mut input = scenario_b_statuses(&students);
    input.insert(stranger, AttendanceStatus::Present);

    let err = service
        .create(&class_ref, date(2024, 3, 1), slot(1), &input)
        .unwrap_err();
    assert!(matches!(err, AttendanceError::StudentNotFound(id) if id == stranger));
    assert!(service.history(&class_ref).unwrap().is_empty());
}

#[test]
fn repository_rejects_counts_that_disagree_with_records() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let repo = SqliteSessionRepository::try_new(&conn).unwrap();

    let write = SessionWrite {
        kind: WriteKind::Create,
        session_id: Uuid::new_v4(),
        class_ref: class_ref.clone(),
        date: date(2024, 3, 1),
        slot: slot(1),
        counts: StatusCounts::tally([AttendanceStatus::Present]),
        records: vec![StudentRecord {
            student_id: students[0].id,
            status: AttendanceStatus::Absent,
        }],
    };

    assert!(repo.write_session_and_records(&write, true).is_err());
    assert!(repo.list_sessions(&class_ref).unwrap().is_empty());
}

#[test]
fn tampered_counts_surface_as_inconsistent_state() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    conn.execute(
        "UPDATE attendance_sessions SET present_count = 9 WHERE session_uuid = ?1;",
        [session.id.to_string()],
    )
    .unwrap();

    let err = service.load_with_records(&class_ref, session.id).unwrap_err();
    assert!(matches!(err, AttendanceError::InconsistentState(_)));
}

#[test]
fn delete_cascades_records() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    service.delete(&class_ref, session.id).unwrap();

    let orphaned: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM student_records WHERE session_uuid = ?1;",
            [session.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphaned, 0);
    assert!(matches!(
        service.get_session(&class_ref, session.id),
        Err(AttendanceError::SessionNotFound(_))
    ));
    assert!(matches!(
        service.delete(&class_ref, session.id),
        Err(AttendanceError::SessionNotFound(_))
    ));
}

#[test]
fn records_outlive_roster_removal() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    SqliteRosterRepository::try_new(&conn)
        .unwrap()
        .remove_student(&class_ref, students[1].id)
        .unwrap();

    let (_, records) = service.load_with_records(&class_ref, session.id).unwrap();
    assert_eq!(records.len(), 4);
}

#[test]
fn update_keeps_records_of_students_who_left_the_roster() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    let departed = students[1].id;
    SqliteRosterRepository::try_new(&conn)
        .unwrap()
        .remove_student(&class_ref, departed)
        .unwrap();

    let remaining = [&students[0], &students[2], &students[3]]
        .into_iter()
        .map(|student| (student.id, AttendanceStatus::Late))
        .collect::<StudentStatuses>();
    let updated = service
        .update(&class_ref, session.id, session.date, session.slot, &remaining)
        .unwrap();

    assert_eq!(updated.counts.late(), 3);
    assert_eq!(updated.counts.absent(), 1);
    let (_, records) = service.load_with_records(&class_ref, session.id).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records
        .iter()
        .any(|record| record.student_id == departed && record.status == AttendanceStatus::Absent));
}

#[test]
fn stored_statuses_of_departed_students_can_be_resubmitted() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    let departed = students[1].id;
    SqliteRosterRepository::try_new(&conn)
        .unwrap()
        .remove_student(&class_ref, departed)
        .unwrap();

    let (_, records) = service.load_with_records(&class_ref, session.id).unwrap();
    let mut stored = records
        .into_iter()
        .map(|record| (record.student_id, record.status))
        .collect::<StudentStatuses>();
    let unchanged = service
        .update(&class_ref, session.id, session.date, session.slot, &stored)
        .unwrap();
    assert_eq!(unchanged.counts, session.counts);

    stored.insert(departed, AttendanceStatus::Justified);
    let updated = service
        .update(&class_ref, session.id, session.date, session.slot, &stored)
        .unwrap();
    assert_eq!(updated.counts.absent(), 0);
    assert_eq!(updated.counts.justified(), 2);

    // A departed student never recorded in this session is still rejected.
    let other = service
        .create(&class_ref, date(2024, 3, 2), slot(1), &StudentStatuses::new())
        .unwrap();
    let err = service
        .update(&class_ref, other.id, other.date, other.slot, &stored)
        .unwrap_err();
    assert!(matches!(err, AttendanceError::StudentNotFound(id) if id == departed));
}

#[test]
fn editing_through_a_draft_keeps_departed_records() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let workflow = AttendanceWorkflow::new(&service);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    SqliteRosterRepository::try_new(&conn)
        .unwrap()
        .remove_student(&class_ref, students[1].id)
        .unwrap();

    let mut draft = workflow.edit_draft(&class_ref, session.id).unwrap();
    assert_eq!(draft.rows().len(), 3);
    draft.toggle(students[0].id).unwrap();
    let saved = workflow.commit(&draft).unwrap();

    assert_eq!(saved.counts.present(), 0);
    assert_eq!(saved.counts.late(), 2);
    assert_eq!(saved.counts.absent(), 1);
    let (_, records) = service.load_with_records(&class_ref, session.id).unwrap();
    assert_eq!(records.len(), 4);
}

#[test]
fn repository_checks_record_owners_inside_the_write() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, _) = seed_class(&conn);
    let repo = SqliteSessionRepository::try_new(&conn).unwrap();
    let stranger = Uuid::new_v4();

    let write = SessionWrite {
        kind: WriteKind::Create,
        session_id: Uuid::new_v4(),
        class_ref: class_ref.clone(),
        date: date(2024, 3, 1),
        slot: slot(1),
        counts: StatusCounts::tally([AttendanceStatus::Present]),
        records: vec![StudentRecord {
            student_id: stranger,
            status: AttendanceStatus::Present,
        }],
    };

    let err = repo.write_session_and_records(&write, true).unwrap_err();
    assert!(matches!(err, RepoError::StudentNotFound(id) if id == stranger));
    assert!(repo.list_sessions(&class_ref).unwrap().is_empty());
}

fn reject_record_inserts(conn: &Connection) {
    conn.execute_batch(
        "CREATE TRIGGER reject_record_inserts
         BEFORE INSERT ON student_records
         BEGIN
             SELECT RAISE(ABORT, 'record insert rejected');
         END;",
    )
    .unwrap();
}

fn stored_record_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM student_records;", [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn failed_record_insert_rolls_back_a_create() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let existing = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    reject_record_inserts(&conn);

    let err = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(2),
            &scenario_b_statuses(&students),
        )
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Storage(_)));
    assert_eq!(service.history(&class_ref).unwrap(), vec![existing]);
    assert!(service
        .available_slots(&class_ref, date(2024, 3, 1), None)
        .unwrap()
        .contains(&slot(2)));
    assert_eq!(stored_record_count(&conn), 4);
}

#[test]
fn failed_record_insert_leaves_an_updated_session_intact() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    let (_, records_before) = service.load_with_records(&class_ref, session.id).unwrap();
    reject_record_inserts(&conn);

    let all_absent = statuses(&students, &[AttendanceStatus::Absent; 4]);
    let err = service
        .update(&class_ref, session.id, date(2024, 3, 4), slot(3), &all_absent)
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Storage(_)));
    let (after, records_after) = service.load_with_records(&class_ref, session.id).unwrap();
    assert_eq!(after, session);
    assert_eq!(records_after, records_before);
    assert_eq!(stored_record_count(&conn), 4);
}

#[test]
fn history_is_newest_date_then_highest_slot_first() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let service = service(&conn);
    let input = scenario_b_statuses(&students);

    service.create(&class_ref, date(2024, 3, 1), slot(1), &input).unwrap();
    service.create(&class_ref, date(2024, 3, 8), slot(1), &input).unwrap();
    service.create(&class_ref, date(2024, 3, 1), slot(4), &input).unwrap();

    let order = service
        .history(&class_ref)
        .unwrap()
        .into_iter()
        .map(|session| (session.date.key(), session.slot.get()))
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            ("2024-03-08".to_string(), 1),
            ("2024-03-01".to_string(), 4),
            ("2024-03-01".to_string(), 1),
        ]
    );
}

#[test]
fn sessions_are_scoped_by_class() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let (other_class, _) = seed_class(&conn);
    let service = service(&conn);
    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();

    assert!(matches!(
        service.get_session(&other_class, session.id),
        Err(AttendanceError::SessionNotFound(_))
    ));
    assert_eq!(
        service
            .available_slots(&other_class, date(2024, 3, 1), None)
            .unwrap()
            .len(),
        5
    );
}

#[test]
fn committed_writes_are_published_to_subscribers() {
    let conn = open_db_in_memory().unwrap();
    let (class_ref, students) = seed_class(&conn);
    let hub = Arc::new(SessionEventHub::new());
    let service = service(&conn).with_events(Arc::clone(&hub));
    let events = hub.subscribe(&class_ref);

    let session = service
        .create(
            &class_ref,
            date(2024, 3, 1),
            slot(1),
            &scenario_b_statuses(&students),
        )
        .unwrap();
    service.delete(&class_ref, session.id).unwrap();

    assert_eq!(events.try_recv().unwrap(), SessionEvent::Saved(session.clone()));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Deleted {
            class_id: class_ref.id,
            session_id: session.id,
        }
    );
    assert!(events.try_recv().is_err());
}
