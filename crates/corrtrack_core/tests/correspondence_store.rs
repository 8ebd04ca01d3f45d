use corrtrack_core::db::open_db_in_memory;
use corrtrack_core::{
    AuditEntry, AuditSink, ChangeLog, Correspondence, CorrespondenceListQuery,
    CorrespondenceRepository, CorrespondenceStatus, CorrespondenceValidationError, Field,
    FieldChange, FieldPatch, FieldValue, FixedClock, Notifier, RepoError, SqliteAuditRepository,
    SqliteCorrespondenceRepository, SqliteNotificationRepository, WriteGuard,
};
use uuid::Uuid;

fn record_at(created_at: i64, subject: &str, status: CorrespondenceStatus) -> Correspondence {
    Correspondence::create_at(
        created_at,
        subject,
        "Ministry of Works",
        "Please advise.",
        Some(status.as_str()),
        None,
    )
    .unwrap()
}

fn patch(pairs: &[(Field, FieldValue)]) -> FieldPatch {
    pairs.iter().cloned().collect()
}

#[test]
fn insert_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);

    let record = Correspondence::create_at(
        1_000,
        "Budget request",
        "Treasury",
        "Body",
        None,
        Some("attachments/budget.pdf".to_string()),
    )
    .unwrap();
    let id = repo.insert(&record).unwrap();

    let loaded = repo.get(id).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.status(), CorrespondenceStatus::Registered);
    assert_eq!(loaded.attachment_ref(), Some("attachments/budget.pdf"));
    assert_eq!(loaded.ao_comments(), "");
    assert_eq!(loaded.version(), 1);
}

#[test]
fn get_missing_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);

    assert!(repo.get(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn list_orders_newest_first_and_filters() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);

    let oldest = record_at(10, "oldest", CorrespondenceStatus::Registered);
    let middle = record_at(20, "middle", CorrespondenceStatus::SentToAo);
    let newest = record_at(30, "newest", CorrespondenceStatus::Registered);
    for record in [&oldest, &middle, &newest] {
        repo.insert(record).unwrap();
    }

    let all = repo.list(&CorrespondenceListQuery::default()).unwrap();
    let subjects: Vec<&str> = all.iter().map(Correspondence::subject).collect();
    assert_eq!(subjects, vec!["newest", "middle", "oldest"]);

    let registered = repo
        .list(&CorrespondenceListQuery {
            status: Some(CorrespondenceStatus::Registered),
            ..CorrespondenceListQuery::default()
        })
        .unwrap();
    assert_eq!(registered.len(), 2);

    let paged = repo
        .list(&CorrespondenceListQuery {
            limit: Some(1),
            offset: 1,
            ..CorrespondenceListQuery::default()
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].subject(), "middle");

    let skipped = repo
        .list(&CorrespondenceListQuery {
            offset: 2,
            ..CorrespondenceListQuery::default()
        })
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].subject(), "oldest");
}

#[test]
fn list_by_date_to_ao_skips_unset_dates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);

    let due = record_at(1, "due", CorrespondenceStatus::SentToAo);
    let later = record_at(2, "later", CorrespondenceStatus::SentToAo);
    let unset = record_at(3, "unset", CorrespondenceStatus::SentToAo);
    for record in [&due, &later, &unset] {
        repo.insert(record).unwrap();
    }
    repo.apply_patch(
        due.id(),
        WriteGuard::Unconditional,
        &patch(&[(Field::DateToAo, FieldValue::Timestamp(100))]),
    )
    .unwrap();
    repo.apply_patch(
        later.id(),
        WriteGuard::Unconditional,
        &patch(&[(Field::DateToAo, FieldValue::Timestamp(500))]),
    )
    .unwrap();

    let selected = repo
        .list(&CorrespondenceListQuery {
            status: Some(CorrespondenceStatus::SentToAo),
            date_to_ao_at_or_before: Some(100),
            ..CorrespondenceListQuery::default()
        })
        .unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].id(), due.id());
}

#[test]
fn apply_patch_writes_all_fields_and_bumps_version() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Registered);
    repo.insert(&record).unwrap();

    let written = repo
        .apply_patch(
            record.id(),
            WriteGuard::ExpectVersion(1),
            &patch(&[
                (Field::Status, CorrespondenceStatus::SentToAo.into()),
                (Field::ActionOfficer, FieldValue::text("ao-7")),
                (Field::DeadlineDate, FieldValue::Timestamp(86_400_000)),
            ]),
        )
        .unwrap();
    assert_eq!(written.version(), 2);

    let loaded = repo.get(record.id()).unwrap().unwrap();
    assert_eq!(loaded, written);
    assert_eq!(loaded.status(), CorrespondenceStatus::SentToAo);
    assert_eq!(loaded.action_officer(), Some("ao-7"));
    assert_eq!(loaded.deadline_date(), Some(86_400_000));
    assert_eq!(loaded.subject(), "subject");
    assert_eq!(loaded.version(), 2);
}

#[test]
fn apply_patch_with_stale_version_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Registered);
    repo.insert(&record).unwrap();

    repo.apply_patch(
        record.id(),
        WriteGuard::ExpectVersion(1),
        &patch(&[(Field::Subject, FieldValue::text("first"))]),
    )
    .unwrap();

    let err = repo
        .apply_patch(
            record.id(),
            WriteGuard::ExpectVersion(1),
            &patch(&[(Field::Subject, FieldValue::text("second"))]),
        )
        .unwrap_err();
    match err {
        RepoError::Conflict {
            id,
            expected,
            actual,
        } => {
            assert_eq!(id, record.id());
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(repo.get(record.id()).unwrap().unwrap().subject(), "first");
}

#[test]
fn unconditional_patch_is_last_write_wins() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Registered);
    repo.insert(&record).unwrap();

    repo.apply_patch(
        record.id(),
        WriteGuard::Unconditional,
        &patch(&[(Field::Subject, FieldValue::text("first"))]),
    )
    .unwrap();
    let written = repo
        .apply_patch(
            record.id(),
            WriteGuard::Unconditional,
            &patch(&[(Field::Subject, FieldValue::text("second"))]),
        )
        .unwrap();

    assert_eq!(written.version(), 3);
    assert_eq!(repo.get(record.id()).unwrap().unwrap().subject(), "second");
}

#[test]
fn apply_patch_on_missing_record_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let missing = Uuid::new_v4();
    let edit = patch(&[(Field::Subject, FieldValue::text("x"))]);

    for guard in [WriteGuard::Unconditional, WriteGuard::ExpectVersion(1)] {
        let err = repo.apply_patch(missing, guard, &edit).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(id) if id == missing));
    }
}

#[test]
fn apply_patch_rejects_mistyped_values() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Registered);
    repo.insert(&record).unwrap();

    let err = repo
        .apply_patch(
            record.id(),
            WriteGuard::Unconditional,
            &patch(&[(Field::Status, FieldValue::text("Processing"))]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(CorrespondenceValidationError::TypeMismatch {
            field: Field::Status,
            ..
        })
    ));
    assert_eq!(repo.get(record.id()).unwrap().unwrap().version(), 1);
}

#[test]
fn unconditional_patch_is_validated_against_stored_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Processing);
    repo.insert(&record).unwrap();
    repo.apply_patch(
        record.id(),
        WriteGuard::Unconditional,
        &patch(&[(Field::Status, CorrespondenceStatus::Registered.into())]),
    )
    .unwrap();

    // Legal against the caller's Processing copy, illegal against the stored row.
    let err = repo
        .apply_patch(
            record.id(),
            WriteGuard::Unconditional,
            &patch(&[(Field::DateActionFinalized, FieldValue::Timestamp(5))]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(CorrespondenceValidationError::FinalizedDateNotAllowed(
            CorrespondenceStatus::Registered
        ))
    ));

    let stored = repo.get(record.id()).unwrap().unwrap();
    assert_eq!(stored.status(), CorrespondenceStatus::Registered);
    assert_eq!(stored.date_action_finalized(), None);
    assert_eq!(stored.version(), 2);
}

#[test]
fn empty_patch_returns_stored_record_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::Registered);
    repo.insert(&record).unwrap();

    let written = repo
        .apply_patch(record.id(), WriteGuard::ExpectVersion(1), &FieldPatch::new())
        .unwrap();
    assert_eq!(written, record);
    assert_eq!(repo.get(record.id()).unwrap().unwrap().version(), 1);
}

#[test]
fn audit_entries_roundtrip_with_wire_field_names() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCorrespondenceRepository::new(&conn);
    let audit = SqliteAuditRepository::new(&conn);
    let record = record_at(1, "subject", CorrespondenceStatus::SentToAo);
    repo.insert(&record).unwrap();

    let mut changes = ChangeLog::new();
    changes.insert(
        Field::Status,
        FieldChange {
            from: CorrespondenceStatus::SentToAo.into(),
            to: CorrespondenceStatus::Processing.into(),
        },
    );
    changes.insert(
        Field::DateToAo,
        FieldChange {
            from: FieldValue::Null,
            to: FieldValue::Timestamp(42),
        },
    );
    let entry = AuditEntry::new("system", record.id(), changes, 5_000);
    audit.append(&entry).unwrap();

    let raw: String = conn
        .query_row("SELECT changes FROM audit_trail;", [], |row| row.get(0))
        .unwrap();
    assert!(raw.contains("\"dateToAO\""));
    assert!(raw.contains("\"Sent to AO\""));

    let entries = audit.entries_for(record.id()).unwrap();
    assert_eq!(entries, vec![entry]);
    assert_eq!(audit.count().unwrap(), 1);
}

#[test]
fn notifications_are_stored_unread_per_recipient() {
    let conn = open_db_in_memory().unwrap();
    let inbox = SqliteNotificationRepository::with_clock(&conn, FixedClock(7_000));

    inbox.send("ao-1", "New correspondence assigned: A").unwrap();
    inbox.send("ao-2", "New correspondence assigned: B").unwrap();

    let items = inbox.list_for_recipient("ao-1").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].message, "New correspondence assigned: A");
    assert_eq!(items[0].created_at, 7_000);
    assert!(!items[0].read);
    assert!(inbox.list_for_recipient("ao-3").unwrap().is_empty());
}
