use corrtrack_core::db::migrations::latest_version;
use corrtrack_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "correspondences");
    assert_table_exists(&conn, "audit_trail");
    assert_table_exists(&conn, "notifications");
    assert_index_exists(&conn, "idx_correspondences_status_date_to_ao");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrtrack.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "correspondences");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_unknown_status_strings() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO correspondences (id, subject, recipient, content, status, created_at)
         VALUES ('x', 's', 'r', 'c', 'sent to ao', 0);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn audit_trail_is_append_only() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO correspondences (id, subject, recipient, content, status, created_at)
         VALUES ('c-1', 's', 'r', 'c', 'Registered', 0);
         INSERT INTO audit_trail (id, actor_id, correspondence_id, changes, timestamp)
         VALUES ('a-1', 'u-1', 'c-1', '{}', 0);",
    )
    .unwrap();

    let update = conn.execute("UPDATE audit_trail SET actor_id = 'u-2';", []);
    assert!(update.unwrap_err().to_string().contains("append-only"));

    let delete = conn.execute("DELETE FROM audit_trail;", []);
    assert!(delete.unwrap_err().to_string().contains("append-only"));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} `{name}` should exist");
}

#[test]
fn schema_rejects_finalized_date_outside_final_states() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO correspondences (id, subject, recipient, content, status, created_at)
         VALUES ('c-1', 's', 'r', 'c', 'Registered', 0);",
    )
    .unwrap();

    let update = conn.execute(
        "UPDATE correspondences SET date_action_finalized = 5 WHERE id = 'c-1';",
        [],
    );
    assert!(update.unwrap_err().to_string().contains("requires Processing"));

    let insert = conn.execute(
        "INSERT INTO correspondences
         (id, subject, recipient, content, status, created_at, date_action_finalized)
         VALUES ('c-2', 's', 'r', 'c', 'Sent to AO', 0, 5);",
        [],
    );
    assert!(insert.is_err());

    conn.execute_batch(
        "UPDATE correspondences SET status = 'Processing', date_action_finalized = 5
         WHERE id = 'c-1';",
    )
    .unwrap();
    let reopen = conn.execute(
        "UPDATE correspondences SET status = 'Registered' WHERE id = 'c-1';",
        [],
    );
    assert!(reopen.is_err());
}

#[test]
fn open_failure_names_the_store_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("corrtrack.db");

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::Open { .. }));
    assert!(err.to_string().contains(&path.display().to_string()));
    assert!(std::error::Error::source(&err).is_some());
}
