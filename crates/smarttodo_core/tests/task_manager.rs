use chrono::NaiveDate;
use rusqlite::Connection;
use smarttodo_core::db::migrations::apply_migrations_to;
use smarttodo_core::db::open_db_in_memory;
use smarttodo_core::{
    BulkFailure, ColumnWrite, FieldAliases, ManagerError, NewTask, Priority, SqliteTaskStore,
    StoreError, StoreResult, Task, TaskField, TaskId, TaskManager, TaskPatch, TaskStatus,
    TaskStore, TaskValidationError,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn manager_on(conn: Connection) -> TaskManager<SqliteTaskStore> {
    let aliases = FieldAliases::default();
    let store = SqliteTaskStore::try_new(conn, &aliases).unwrap();
    TaskManager::new(store, aliases)
}

fn manager() -> TaskManager<SqliteTaskStore> {
    manager_on(open_db_in_memory().unwrap())
}

fn add(manager: &mut TaskManager<SqliteTaskStore>, title: &str) -> TaskId {
    manager.add_task(NewTask::new(title)).unwrap().task.id
}

fn delete_row(manager: &TaskManager<SqliteTaskStore>, id: TaskId) {
    manager
        .store()
        .connection()
        .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])
        .unwrap();
}

/// Store that is never reachable.
struct OfflineStore;

impl OfflineStore {
    fn error() -> StoreError {
        StoreError::InvalidData("store offline".to_string())
    }
}

impl TaskStore for OfflineStore {
    fn create(&self, _columns: &[ColumnWrite]) -> StoreResult<Task> {
        Err(Self::error())
    }

    fn import(&self, _task: &Task, _columns: &[ColumnWrite]) -> StoreResult<Task> {
        Err(Self::error())
    }

    fn get(&self, _id: TaskId) -> StoreResult<Option<Task>> {
        Err(Self::error())
    }

    fn list(&self) -> StoreResult<Vec<Task>> {
        Err(Self::error())
    }

    fn update(&self, _id: TaskId, _columns: &[ColumnWrite]) -> StoreResult<Task> {
        Err(Self::error())
    }

    fn delete(&self, _id: TaskId) -> StoreResult<()> {
        Err(Self::error())
    }
}

#[test]
fn add_task_rejects_blank_title() {
    let mut manager = manager();
    for title in ["", "   "] {
        assert!(matches!(
            manager.add_task(NewTask::new(title)),
            Err(ManagerError::Validation(TaskValidationError::EmptyTitle))
        ));
    }
    assert!(manager.tasks().is_empty());
}

#[test]
fn add_task_persists_with_store_identity() {
    let mut manager = manager();
    let mutation = manager
        .add_task(
            NewTask::new("call plumber")
                .priority(Priority::High)
                .due_date(date(2024, 1, 12))
                .notes("leak under sink"),
        )
        .unwrap();

    assert!(mutation.outcome.applied_to_store);
    assert_eq!(mutation.outcome.message(), "Saved.");
    assert_eq!(manager.tasks().to_vec(), vec![mutation.task.clone()]);

    let stored = manager.store().get(mutation.task.id).unwrap().unwrap();
    assert_eq!(stored.priority, Priority::High);
    assert_eq!(stored.notes.as_deref(), Some("leak under sink"));
}

#[test]
fn update_task_on_unknown_id_is_not_found() {
    let mut manager = manager();
    add(&mut manager, "known");
    let unknown = Uuid::new_v4();

    assert!(matches!(
        manager.update_task(unknown, TaskPatch::default().title("x")),
        Err(ManagerError::NotFound(id)) if id == unknown
    ));
    assert_eq!(manager.tasks().len(), 1);
}

#[test]
fn update_task_rejects_blank_title_without_touching_state() {
    let mut manager = manager();
    let id = add(&mut manager, "keep me");

    assert!(matches!(
        manager.update_task(id, TaskPatch::default().title("  ")),
        Err(ManagerError::Validation(TaskValidationError::EmptyTitle))
    ));
    assert_eq!(manager.get(id).unwrap().title, "keep me");
}

#[test]
fn update_task_writes_through_to_store() {
    let mut manager = manager();
    let id = add(&mut manager, "draft");

    let mutation = manager
        .update_task(
            id,
            TaskPatch::default()
                .title("final")
                .due_date(Some(date(2024, 2, 2)))
                .notes(Some("v2".to_string())),
        )
        .unwrap();
    assert!(mutation.outcome.applied_to_store);

    let stored = manager.store().get(id).unwrap().unwrap();
    assert!(stored.same_content(manager.get(id).unwrap()));
    assert_eq!(stored.title, "final");
}

#[test]
fn bulk_delete_continues_past_store_failures() {
    let mut manager = manager();
    let first = add(&mut manager, "one");
    let second = add(&mut manager, "two");
    delete_row(&manager, second);

    let report = manager.bulk_delete(&[first, second]);

    assert_eq!(report.succeeded, vec![first]);
    assert_eq!(report.failed_ids(), vec![second]);
    assert!(matches!(
        &report.failed[0],
        BulkFailure::NotPersisted { id, .. } if *id == second
    ));
    assert!(manager.tasks().is_empty());
    assert!(manager.store().get(first).unwrap().is_none());
}

#[test]
fn bulk_delete_reports_ids_missing_from_the_mirror() {
    let mut manager = manager();
    let known = add(&mut manager, "known");
    let unknown = Uuid::new_v4();

    let report = manager.bulk_delete(&[unknown, known]);

    assert_eq!(report.succeeded, vec![known]);
    assert_eq!(report.failed, vec![BulkFailure::NotFound(unknown)]);
}

#[test]
fn bulk_complete_marks_each_task() {
    let mut manager = manager();
    let first = add(&mut manager, "a");
    let second = add(&mut manager, "b");

    let report = manager.bulk_complete(&[first, second]);

    assert!(report.is_complete());
    for id in [first, second] {
        assert_eq!(manager.get(id).unwrap().status, TaskStatus::Completed);
        assert_eq!(
            manager.store().get(id).unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }
}

#[test]
fn toggle_status_flips_back_and_forth() {
    let mut manager = manager();
    let id = add(&mut manager, "flip");

    manager.toggle_status(id).unwrap();
    assert_eq!(manager.get(id).unwrap().status, TaskStatus::Completed);
    manager.toggle_status(id).unwrap();
    assert_eq!(manager.get(id).unwrap().status, TaskStatus::Open);
}

#[test]
fn snooze_moves_due_date_or_starts_from_today() {
    let mut manager = manager();
    let today = date(2024, 1, 10);
    let dated = manager
        .add_task(NewTask::new("dated").due_date(date(2024, 1, 8)))
        .unwrap()
        .task
        .id;
    let undated = add(&mut manager, "undated");

    manager.snooze(dated, 3, today).unwrap();
    manager.snooze(undated, 2, today).unwrap();

    assert_eq!(manager.get(dated).unwrap().due_date, Some(date(2024, 1, 11)));
    assert_eq!(
        manager.store().get(undated).unwrap().unwrap().due_date,
        Some(date(2024, 1, 12))
    );
    assert_eq!(manager.get(undated).unwrap().status, TaskStatus::Open);
}

#[test]
fn set_priority_falls_back_to_priority_level_column() {
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
    let mut manager = manager_on(conn);

    let created = manager
        .add_task(NewTask::new("legacy row").priority(Priority::Low))
        .unwrap();
    assert!(created.outcome.applied_to_store);

    let id = created.task.id;
    let updated = manager.set_priority(id, Priority::Critical).unwrap();
    assert!(updated.outcome.applied_to_store);
    assert!(updated.outcome.rejected_fields.is_empty());

    let level: String = manager
        .store()
        .connection()
        .query_row(
            "SELECT priority_level FROM tasks WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(level, "Critical");
}

#[test]
fn notes_stay_in_memory_when_the_store_has_no_notes_column() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();
    let mut manager = manager_on(conn);

    let created = manager
        .add_task(NewTask::new("old schema").notes("remember this"))
        .unwrap();
    assert!(!created.outcome.applied_to_store);
    assert!(created.outcome.applied_in_memory);
    assert_eq!(created.outcome.rejected_fields, vec![TaskField::Notes]);
    assert_eq!(
        created.outcome.message(),
        "Saved; notes kept on this device only."
    );

    let id = created.task.id;
    assert_eq!(
        manager.get(id).unwrap().notes.as_deref(),
        Some("remember this")
    );
    assert!(manager.store().get(id).unwrap().is_some());

    let updated = manager
        .update_task(
            id,
            TaskPatch::default()
                .priority(Priority::High)
                .notes(Some("changed".to_string())),
        )
        .unwrap();
    assert_eq!(updated.outcome.rejected_fields, vec![TaskField::Notes]);
    assert_eq!(manager.get(id).unwrap().notes.as_deref(), Some("changed"));
    assert_eq!(
        manager.store().get(id).unwrap().unwrap().priority,
        Priority::High
    );
}

#[test]
fn offline_store_keeps_changes_in_memory() {
    let mut manager = TaskManager::new(OfflineStore, FieldAliases::default());

    let created = manager.add_task(NewTask::new("offline")).unwrap();
    assert!(!created.outcome.applied_to_store);
    assert!(created.outcome.store_error.is_some());
    assert_eq!(
        created.outcome.message(),
        "Saved on this device only; the task store is unavailable."
    );

    let id = created.task.id;
    let completed = manager.complete_task(id).unwrap();
    assert!(completed.outcome.applied_in_memory);
    assert_eq!(manager.get(id).unwrap().status, TaskStatus::Completed);

    let report = manager.bulk_delete(&[id]);
    assert_eq!(report.failed_ids(), vec![id]);
    assert!(manager.tasks().is_empty());
}

#[test]
fn load_falls_back_to_snapshot_when_store_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("tasks.json");

    let mut online = manager().with_snapshot(&snapshot);
    add(&mut online, "first");
    add(&mut online, "second");
    let expected = online.tasks().to_vec();

    let mut offline = TaskManager::new(OfflineStore, FieldAliases::default())
        .with_snapshot(&snapshot);
    assert_eq!(offline.load().unwrap(), 2);
    assert_eq!(offline.tasks(), expected.as_slice());

    let mut bare = TaskManager::new(OfflineStore, FieldAliases::default());
    assert!(matches!(bare.load(), Err(ManagerError::Persistence(_))));
}

#[test]
fn sync_pulls_updates_and_pushes_under_existing_ids() {
    let mut manager = manager();
    let edited = add(&mut manager, "local title");
    let local_only = add(&mut manager, "never reached store");
    delete_row(&manager, local_only);
    manager
        .store()
        .connection()
        .execute(
            "UPDATE tasks SET title = 'remote title' WHERE id = ?1;",
            [edited.to_string()],
        )
        .unwrap();
    let remote = manager
        .store()
        .create(&[ColumnWrite::new("title", Some("from another device".into()))])
        .unwrap();

    let summary = manager.sync_with_store(false).unwrap();

    assert_eq!(summary.pulled, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.pushed, 1);
    assert_eq!(manager.get(edited).unwrap().title, "remote title");
    assert!(manager.get(remote.id).is_some());
    assert_eq!(
        manager.store().get(local_only).unwrap().unwrap().title,
        "never reached store"
    );
}

#[test]
fn sync_preferring_local_keeps_mirror_values() {
    let mut manager = manager();
    let id = add(&mut manager, "mine");
    manager
        .store()
        .connection()
        .execute(
            "UPDATE tasks SET title = 'theirs' WHERE id = ?1;",
            [id.to_string()],
        )
        .unwrap();

    let summary = manager.sync_with_store(true).unwrap();

    assert_eq!(summary.updated, 0);
    assert_eq!(manager.get(id).unwrap().title, "mine");
}

#[test]
fn sync_keeps_notes_the_store_cannot_hold() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();
    let mut manager = manager_on(conn);
    let id = manager
        .add_task(NewTask::new("old schema").notes("remember this"))
        .unwrap()
        .task
        .id;

    for _ in 0..2 {
        let summary = manager.sync_with_store(false).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(
            manager.get(id).unwrap().notes.as_deref(),
            Some("remember this")
        );
    }

    manager
        .store()
        .connection()
        .execute(
            "UPDATE tasks SET title = 'renamed elsewhere' WHERE id = ?1;",
            [id.to_string()],
        )
        .unwrap();
    let summary = manager.sync_with_store(false).unwrap();

    assert_eq!(summary.updated, 1);
    let task = manager.get(id).unwrap();
    assert_eq!(task.title, "renamed elsewhere");
    assert_eq!(task.notes.as_deref(), Some("remember this"));
}

#[test]
fn load_keeps_offline_tasks_from_the_snapshot_until_sync_pushes_them() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("tasks.json");

    let mut offline = TaskManager::new(OfflineStore, FieldAliases::default())
        .with_snapshot(&snapshot);
    let draft = offline
        .add_task(NewTask::new("written on a train"))
        .unwrap()
        .task
        .id;

    let mut online = manager().with_snapshot(&snapshot);
    let stored = online
        .store()
        .create(&[ColumnWrite::new("title", Some("already stored".into()))])
        .unwrap();

    assert_eq!(online.load().unwrap(), 2);
    let ids = online.tasks().iter().map(|task| task.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![stored.id, draft]);
    assert!(online.store().get(draft).unwrap().is_none());

    let summary = online.sync_with_store(false).unwrap();
    assert_eq!(summary.pushed, 1);
    assert_eq!(
        online.store().get(draft).unwrap().unwrap().title,
        "written on a train"
    );
}
