use rollbook_core::db::open_db_in_memory;
use rollbook_core::{ClassRef, ClassScope, RepoError, RosterStore, SqliteRosterRepository, StudentInput};
use uuid::Uuid;

#[test]
fn list_students_is_ordered_by_last_name() {
    let conn = open_db_in_memory().unwrap();
    let roster = SqliteRosterRepository::try_new(&conn).unwrap();
    let class = roster
        .create_class(ClassScope::Institutional, "  3rd A  ")
        .unwrap();
    assert_eq!(class.name, "3rd A");

    roster
        .add_student(&class.class_ref, &StudentInput::new("003", "Zamora", "Luis"))
        .unwrap();
    roster
        .add_student(&class.class_ref, &StudentInput::new("001", "alvarez", "Rita"))
        .unwrap();
    roster
        .add_student(&class.class_ref, &StudentInput::new("002", "Alvarez", "Ana"))
        .unwrap();

    let names = roster
        .list_students(&class.class_ref)
        .unwrap()
        .into_iter()
        .map(|student| format!("{}, {}", student.last_name, student.first_name))
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Alvarez, Ana", "alvarez, Rita", "Zamora, Luis"]);
}

#[test]
fn blank_fields_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let roster = SqliteRosterRepository::try_new(&conn).unwrap();

    assert!(matches!(
        roster.create_class(ClassScope::Institutional, "   "),
        Err(RepoError::InvalidInput(_))
    ));

    let class = roster.create_class(ClassScope::Institutional, "Math").unwrap();
    let err = roster
        .add_student(&class.class_ref, &StudentInput::new("10", " ", "Eva"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidInput(message) if message.contains("last_name")));
}

#[test]
fn personal_class_is_only_visible_to_its_owner() {
    let conn = open_db_in_memory().unwrap();
    let roster = SqliteRosterRepository::try_new(&conn).unwrap();
    let class = roster
        .create_class(
            ClassScope::Personal {
                owner_id: "teacher-1".to_string(),
            },
            "Tutoring",
        )
        .unwrap();

    let stranger = ClassRef::personal(class.class_ref.id, "teacher-2");
    let as_institutional = ClassRef::institutional(class.class_ref.id);

    assert!(roster.get_class(&class.class_ref).unwrap().is_some());
    assert!(roster.get_class(&stranger).unwrap().is_none());
    assert!(matches!(
        roster.list_students(&as_institutional),
        Err(RepoError::ClassNotFound(id)) if id == class.class_ref.id
    ));
}

#[test]
fn update_and_remove_student() {
    let conn = open_db_in_memory().unwrap();
    let roster = SqliteRosterRepository::try_new(&conn).unwrap();
    let class = roster.create_class(ClassScope::Institutional, "History").unwrap();
    let student = roster
        .add_student(&class.class_ref, &StudentInput::new("7", "Perez", "Juan"))
        .unwrap();

    let updated = roster
        .update_student(
            &class.class_ref,
            student.id,
            &StudentInput::new("7", "Pérez", "Juan Carlos"),
        )
        .unwrap();
    assert_eq!(
        roster.get_student(&class.class_ref, student.id).unwrap(),
        Some(updated)
    );

    roster.remove_student(&class.class_ref, student.id).unwrap();
    assert_eq!(roster.get_student(&class.class_ref, student.id).unwrap(), None);
    assert!(matches!(
        roster.remove_student(&class.class_ref, student.id),
        Err(RepoError::StudentNotFound(id)) if id == student.id
    ));
}

#[test]
fn rename_class_requires_existing_class() {
    let conn = open_db_in_memory().unwrap();
    let roster = SqliteRosterRepository::try_new(&conn).unwrap();
    let class = roster.create_class(ClassScope::Institutional, "Art").unwrap();

    roster.rename_class(&class.class_ref, "Fine Art").unwrap();
    assert_eq!(
        roster.get_class(&class.class_ref).unwrap().unwrap().name,
        "Fine Art"
    );

    let missing = ClassRef::institutional(Uuid::new_v4());
    assert!(matches!(
        roster.rename_class(&missing, "Ghost"),
        Err(RepoError::ClassNotFound(_))
    ));
}
