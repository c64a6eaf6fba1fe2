use smarttodo_core::db::migrations::{apply_migrations_to, latest_version};
use smarttodo_core::db::{open_db_in_memory, DbError};
use smarttodo_core::{
    ColumnWrite, FieldAliases, Priority, SqliteTaskStore, StoreError, Task, TaskStatus, TaskStore,
};
use rusqlite::Connection;
use uuid::Uuid;

fn store() -> SqliteTaskStore {
    SqliteTaskStore::try_new(open_db_in_memory().unwrap(), &FieldAliases::default()).unwrap()
}

fn title(value: &str) -> ColumnWrite {
    ColumnWrite::new("title", Some(value.to_string()))
}

#[test]
fn create_assigns_identity_and_defaults() {
    let store = store();
    let created = store.create(&[title("  write report  ")]).unwrap();

    assert!(!created.id.is_nil());
    assert_eq!(created.title, "write report");
    assert_eq!(created.priority, Priority::Medium);
    assert_eq!(created.status, TaskStatus::Open);
    assert_eq!(created.due_date, None);
    assert!(created.created_at.is_some());

    let loaded = store.get(created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn create_writes_every_named_column() {
    let store = store();
    let created = store
        .create(&[
            title("renew passport"),
            ColumnWrite::new("priority", Some("High".to_string())),
            ColumnWrite::new("due_date", Some("2024-05-01".to_string())),
            ColumnWrite::new("notes", Some("bring photos".to_string())),
        ])
        .unwrap();

    assert_eq!(created.priority, Priority::High);
    assert_eq!(created.due_date.unwrap().to_string(), "2024-05-01");
    assert_eq!(created.notes.as_deref(), Some("bring photos"));
}

#[test]
fn unknown_column_is_rejected_without_writing() {
    let store = store();
    let err = store
        .create(&[title("paint"), ColumnWrite::new("colour", Some("red".into()))])
        .unwrap_err();

    match err {
        StoreError::RejectedField { column } => assert_eq!(column, "colour"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn list_returns_creation_order() {
    let store = store();
    let first = store.create(&[title("first")]).unwrap();
    let second = store.create(&[title("second")]).unwrap();
    let third = store.create(&[title("third")]).unwrap();

    let ids = store
        .list()
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
}

#[test]
fn update_changes_named_columns_and_clears_with_null() {
    let store = store();
    let created = store
        .create(&[
            title("book flights"),
            ColumnWrite::new("due_date", Some("2024-06-01".to_string())),
        ])
        .unwrap();

    let updated = store
        .update(
            created.id,
            &[
                ColumnWrite::new("status", Some("Completed".to_string())),
                ColumnWrite::new("due_date", None),
            ],
        )
        .unwrap();

    assert_eq!(updated.status, TaskStatus::Completed);
    assert_eq!(updated.due_date, None);
    assert_eq!(updated.title, "book flights");
}

#[test]
fn update_and_delete_report_missing_rows() {
    let store = store();
    let id = Uuid::new_v4();

    assert!(matches!(
        store.update(id, &[title("ghost")]),
        Err(StoreError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(
        store.delete(id),
        Err(StoreError::NotFound(missing)) if missing == id
    ));
}

#[test]
fn delete_removes_row() {
    let store = store();
    let created = store.create(&[title("temp")]).unwrap();

    store.delete(created.id).unwrap();
    assert!(store.get(created.id).unwrap().is_none());
}

#[test]
fn import_keeps_identity_and_refuses_duplicates() {
    let store = store();
    let mut task = Task::with_id(Uuid::new_v4(), "offline draft").unwrap();
    task.created_at = Some(1_700_000_000_000);

    let imported = store.import(&task, &[title("offline draft")]).unwrap();
    assert_eq!(imported.id, task.id);
    assert_eq!(imported.created_at, Some(1_700_000_000_000));

    assert!(matches!(
        store.import(&task, &[title("offline draft")]),
        Err(StoreError::AlreadyExists(id)) if id == task.id
    ));
}

#[test]
fn invalid_persisted_status_is_reported_on_read() {
    let store = store();
    let created = store.create(&[title("odd")]).unwrap();
    store
        .connection()
        .execute(
            "UPDATE tasks SET status = 'archived' WHERE id = ?1;",
            [created.id.to_string()],
        )
        .unwrap();

    assert!(matches!(store.list(), Err(StoreError::InvalidData(_))));
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteTaskStore::try_new(conn, &FieldAliases::default())
        .err()
        .unwrap();

    match err {
        StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn try_new_rejects_newer_schema() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();

    assert!(matches!(
        SqliteTaskStore::try_new(conn, &FieldAliases::default()),
        Err(StoreError::Db(DbError::UnsupportedSchemaVersion { db_version: 999, .. }))
    ));
}

#[test]
fn try_new_requires_tasks_table_and_key_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    assert!(matches!(
        SqliteTaskStore::try_new(conn, &FieldAliases::default()),
        Err(StoreError::MissingRequiredTable("tasks"))
    ));

    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (id TEXT PRIMARY KEY, title TEXT NOT NULL, created_at INTEGER, updated_at INTEGER);
         PRAGMA user_version = 1;",
    )
    .unwrap();
    assert!(matches!(
        SqliteTaskStore::try_new(conn, &FieldAliases::default()),
        Err(StoreError::MissingRequiredColumn {
            table: "tasks",
            column: "status"
        })
    ));
}

#[test]
fn schema_without_notes_rejects_notes_writes() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();
    let store = SqliteTaskStore::try_new(conn, &FieldAliases::default()).unwrap();

    assert!(!store.accepts_column("notes"));
    assert!(store.accepts_column("priority"));

    let created = store.create(&[title("v1 row")]).unwrap();
    assert_eq!(created.notes, None);
    assert!(matches!(
        store.update(created.id, &[ColumnWrite::new("notes", Some("x".into()))]),
        Err(StoreError::RejectedField { column }) if column == "notes"
    ));
}

#[test]
fn priority_is_read_through_its_alias() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            priority_level TEXT,
            status TEXT NOT NULL DEFAULT 'Open',
            due_date TEXT,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        PRAGMA user_version = 2;",
    )
    .unwrap();
    let store = SqliteTaskStore::try_new(conn, &FieldAliases::default()).unwrap();

    assert!(!store.accepts_column("priority"));
    let created = store
        .create(&[
            title("legacy"),
            ColumnWrite::new("priority_level", Some("Critical".to_string())),
        ])
        .unwrap();
    assert_eq!(created.priority, Priority::Critical);
}
