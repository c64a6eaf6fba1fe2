//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level task functions to Dart via FRB.
//! - Hold one task manager session per process.
//! - Flatten core results into plain envelopes with UI-ready messages.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Task ids cross the boundary as hyphenated UUID strings.
//! - Dates cross the boundary as `YYYY-MM-DD` strings.

use chrono::{Local, NaiveDate};
use log::{info, warn};
use smarttodo_core::db::open_db;
use smarttodo_core::{
    classify, completed_per_day, core_version as core_version_inner,
    init_logging as init_logging_inner, parse_due_date, ping as ping_inner,
    priority_distribution, summarize, urgency_score, view, BulkReport, FieldAliases,
    ManagerError, NewTask, Priority, SortKey, SqliteTaskStore, Task, TaskId, TaskManager,
    TaskMutation, TaskPatch, TaskStatus, TodoConfig,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SNAPSHOT_EXTENSION: &str = "snapshot.json";

static SESSION: Mutex<Option<Session>> = Mutex::new(None);

struct Session {
    db_path: PathBuf,
    manager: TaskManager<SqliteTaskStore>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One task as displayed by the list view.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub priority: String,
    pub status: String,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    /// Classifier label (`Completed|None|Very Overdue|Overdue|Due Soon|Upcoming`).
    pub category: String,
    pub urgency: f64,
}

/// Filtered and sorted task list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskListResponse {
    pub items: Vec<TaskRow>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

/// Single-task action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    /// Whether the action was accepted (at least in memory).
    pub ok: bool,
    pub task_id: Option<String>,
    /// Whether the task store holds every touched attribute.
    pub applied_to_store: bool,
    /// Human-readable response message for UI.
    pub message: String,
}

impl TaskActionResponse {
    fn from_mutation(mutation: &TaskMutation) -> Self {
        Self {
            ok: mutation.outcome.applied_in_memory,
            task_id: Some(mutation.task.id.to_string()),
            applied_to_store: mutation.outcome.applied_to_store,
            message: mutation.outcome.message(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            applied_to_store: false,
            message: message.into(),
        }
    }
}

/// Bulk action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBulkResponse {
    pub succeeded: Vec<String>,
    /// Requested ids that were unparseable, not found or not persisted, in
    /// request order.
    pub failed: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSyncResponse {
    pub ok: bool,
    pub pushed: u32,
    pub pulled: u32,
    pub updated: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityCount {
    pub priority: String,
    pub count: u32,
}

/// Analytics panel payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatsResponse {
    pub completed_per_day: Vec<DailyCount>,
    pub priority_distribution: Vec<PriorityCount>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub message: String,
}

/// Opens (or reopens) the task session on `db_path`.
///
/// An empty `db_path` resolves through `SMARTTODO_DB_PATH`, then the temp
/// directory. The JSON snapshot sits beside the database file.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn task_open(db_path: String) -> TaskActionResponse {
    let path = match db_path.trim() {
        "" => TodoConfig::default().resolve_db_path(),
        trimmed => PathBuf::from(trimmed),
    };
    let mut guard = lock_session();
    match open_session(&path) {
        Ok(session) => {
            let count = session.manager.tasks().len();
            info!(
                "event=session_open module=ffi status=ok db_path={} tasks={count}",
                session.db_path.display()
            );
            *guard = Some(session);
            TaskActionResponse {
                ok: true,
                task_id: None,
                applied_to_store: true,
                message: format!("Loaded {count} task(s)."),
            }
        }
        Err(err) => TaskActionResponse::failure(format!("task_open failed: {err}")),
    }
}

/// Filters and sorts the task list for display.
///
/// `sort_key` is a column name (`title|priority|status|due_date|notes`).
#[flutter_rust_bridge::frb(sync)]
pub fn task_view(query: String, sort_key: String, descending: bool) -> TaskListResponse {
    let key = match sort_key.parse::<SortKey>() {
        Ok(key) => key,
        Err(err) => {
            return TaskListResponse {
                items: Vec::new(),
                message: format!("task_view failed: {err}"),
            }
        }
    };
    let today = today();
    let result = with_session(|manager| {
        Ok(view(manager.tasks(), &query, key, descending)
            .into_iter()
            .map(|task| to_task_row(task, today))
            .collect::<Vec<_>>())
    });
    match result {
        Ok(items) => {
            let message = if items.is_empty() {
                "No tasks.".to_string()
            } else {
                format!("Showing {} task(s).", items.len())
            };
            TaskListResponse { items, message }
        }
        Err(err) => TaskListResponse {
            items: Vec::new(),
            message: format!("task_view failed: {err}"),
        },
    }
}

/// Creates a task. Blank optional inputs are treated as absent.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(
    title: String,
    priority: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
) -> TaskActionResponse {
    let input = match build_new_task(title, priority, due_date, notes) {
        Ok(input) => input,
        Err(err) => return TaskActionResponse::failure(format!("task_add failed: {err}")),
    };
    mutation_response("task_add", with_session(|manager| manager.add_task(input)))
}

/// Edits a task. `None` leaves an attribute unchanged; an empty
/// `due_date` or `notes` clears it.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(
    id: String,
    title: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
) -> TaskActionResponse {
    let parsed = parse_task_id(&id).and_then(|id| {
        build_patch(title, priority, status, due_date, notes).map(|patch| (id, patch))
    });
    let (id, patch) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return TaskActionResponse::failure(format!("task_update failed: {err}")),
    };
    mutation_response(
        "task_update",
        with_session(|manager| manager.update_task(id, patch)),
    )
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_set_priority(id: String, priority: String) -> TaskActionResponse {
    let parsed = parse_task_id(&id).and_then(|id| {
        priority
            .parse::<Priority>()
            .map(|priority| (id, priority))
            .map_err(|err| err.to_string())
    });
    let (id, priority) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => {
            return TaskActionResponse::failure(format!("task_set_priority failed: {err}"))
        }
    };
    mutation_response(
        "task_set_priority",
        with_session(|manager| manager.set_priority(id, priority)),
    )
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_toggle_status(id: String) -> TaskActionResponse {
    let id = match parse_task_id(&id) {
        Ok(id) => id,
        Err(err) => {
            return TaskActionResponse::failure(format!("task_toggle_status failed: {err}"))
        }
    };
    mutation_response(
        "task_toggle_status",
        with_session(|manager| manager.toggle_status(id)),
    )
}

/// Pushes the due date `days` forward from the current due date, or from
/// today when the task is undated.
#[flutter_rust_bridge::frb(sync)]
pub fn task_snooze(id: String, days: u32) -> TaskActionResponse {
    let id = match parse_task_id(&id) {
        Ok(id) => id,
        Err(err) => return TaskActionResponse::failure(format!("task_snooze failed: {err}")),
    };
    let today = today();
    mutation_response(
        "task_snooze",
        with_session(|manager| manager.snooze(id, days, today)),
    )
}

/// Deletes every id independently.
///
/// Unparseable ids are reported as failed without touching the others.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete_many(ids: Vec<String>) -> TaskBulkResponse {
    bulk_response("task_delete_many", ids, |manager, ids| {
        manager.bulk_delete(ids)
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_complete_many(ids: Vec<String>) -> TaskBulkResponse {
    bulk_response("task_complete_many", ids, |manager, ids| {
        manager.bulk_complete(ids)
    })
}

/// Reconciles the session with the task store.
#[flutter_rust_bridge::frb(sync)]
pub fn task_sync(prefer_local: bool) -> TaskSyncResponse {
    match with_session(|manager| manager.sync_with_store(prefer_local)) {
        Ok(summary) => TaskSyncResponse {
            ok: true,
            pushed: to_u32(summary.pushed),
            pulled: to_u32(summary.pulled),
            updated: to_u32(summary.updated),
            message: format!(
                "Synced: {} pushed, {} pulled, {} updated.",
                summary.pushed, summary.pulled, summary.updated
            ),
        },
        Err(err) => TaskSyncResponse {
            ok: false,
            pushed: 0,
            pulled: 0,
            updated: 0,
            message: format!("task_sync failed: {err}"),
        },
    }
}

/// Completion and priority analytics over the last `days_back` days.
#[flutter_rust_bridge::frb(sync)]
pub fn task_stats(days_back: u32) -> TaskStatsResponse {
    let today = today();
    let result = with_session(|manager| {
        let per_day = completed_per_day(manager.tasks(), today, days_back);
        let distribution = priority_distribution(manager.tasks());
        Ok((per_day, distribution))
    });
    let (per_day, distribution) = match result {
        Ok(data) => data,
        Err(err) => {
            return TaskStatsResponse {
                completed_per_day: Vec::new(),
                priority_distribution: Vec::new(),
                mean: None,
                median: None,
                std_dev: None,
                message: format!("task_stats failed: {err}"),
            }
        }
    };

    let summary = summarize(&per_day);
    TaskStatsResponse {
        completed_per_day: per_day
            .iter()
            .map(|(date, count)| DailyCount {
                date: date.format("%Y-%m-%d").to_string(),
                count: *count,
            })
            .collect(),
        priority_distribution: distribution
            .iter()
            .map(|(priority, count)| PriorityCount {
                priority: priority.label().to_string(),
                count: to_u32(*count),
            })
            .collect(),
        mean: summary.map(|summary| summary.mean),
        median: summary.map(|summary| summary.median),
        std_dev: summary.map(|summary| summary.std_dev),
        message: match summary {
            Some(summary) => format!("{} task(s) completed.", summary.total),
            None => "No completion data for this period.".to_string(),
        },
    }
}

fn open_session(db_path: &Path) -> Result<Session, String> {
    let conn = open_db(db_path).map_err(|err| format!("task DB open failed: {err}"))?;
    let store = SqliteTaskStore::try_new(conn, &FieldAliases::default())
        .map_err(|err| format!("task store init failed: {err}"))?;
    let mut manager = TaskManager::new(store, FieldAliases::default())
        .with_snapshot(db_path.with_extension(SNAPSHOT_EXTENSION));
    manager.load().map_err(|err| err.to_string())?;
    Ok(Session {
        db_path: db_path.to_path_buf(),
        manager,
    })
}

fn lock_session() -> MutexGuard<'static, Option<Session>> {
    // A poisoned lock only means an earlier call panicked mid-action; the
    // mirror is still usable.
    SESSION
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `f` against the session, opening the default one on first use.
fn with_session<T>(
    f: impl FnOnce(&mut TaskManager<SqliteTaskStore>) -> Result<T, ManagerError>,
) -> Result<T, String> {
    let mut guard = lock_session();
    if guard.is_none() {
        *guard = Some(open_session(&TodoConfig::default().resolve_db_path())?);
    }
    match guard.as_mut() {
        Some(session) => f(&mut session.manager).map_err(|err| err.to_string()),
        None => Err("task session unavailable".to_string()),
    }
}

fn mutation_response(
    action: &str,
    result: Result<TaskMutation, String>,
) -> TaskActionResponse {
    match result {
        Ok(mutation) => TaskActionResponse::from_mutation(&mutation),
        Err(err) => TaskActionResponse::failure(format!("{action} failed: {err}")),
    }
}

fn bulk_response(
    action: &str,
    raw_ids: Vec<String>,
    run: impl FnOnce(&mut TaskManager<SqliteTaskStore>, &[TaskId]) -> BulkReport,
) -> TaskBulkResponse {
    let parsed = raw_ids
        .iter()
        .map(|raw| parse_task_id(raw).ok())
        .collect::<Vec<_>>();
    let ids = parsed.iter().flatten().copied().collect::<Vec<_>>();

    let report = match with_session(|manager| Ok(run(manager, &ids))) {
        Ok(report) => report,
        Err(err) => {
            warn!("event={action} module=ffi status=error error={err}");
            return TaskBulkResponse {
                succeeded: Vec::new(),
                failed: raw_ids,
                message: format!("{action} failed: {err}"),
            };
        }
    };

    // Ids run in request order, so a repeated id succeeds on its first
    // occurrences and fails on the rest.
    let mut saved = HashMap::<TaskId, usize>::new();
    for id in &report.succeeded {
        *saved.entry(*id).or_default() += 1;
    }
    let failed = raw_ids
        .into_iter()
        .zip(parsed)
        .filter(|(_, id)| match id.and_then(|id| saved.get_mut(&id)) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        })
        .map(|(raw, _)| raw)
        .collect::<Vec<_>>();
    let message = if failed.is_empty() {
        format!("{} task(s) updated.", report.succeeded.len())
    } else {
        format!(
            "{} task(s) updated; {} could not be saved.",
            report.succeeded.len(),
            failed.len()
        )
    };
    TaskBulkResponse {
        succeeded: report.succeeded.iter().map(Uuid::to_string).collect(),
        failed,
        message,
    }
}

fn build_new_task(
    title: String,
    priority: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
) -> Result<NewTask, String> {
    let mut input = NewTask::new(title);
    if let Some(priority) = non_blank(priority) {
        input = input.priority(priority.parse().map_err(|err| format!("{err}"))?);
    }
    if let Some(due) = parse_due_date(due_date.as_deref().unwrap_or_default())
        .map_err(|err| err.to_string())?
    {
        input = input.due_date(due);
    }
    if let Some(notes) = non_blank(notes) {
        input = input.notes(notes);
    }
    Ok(input)
}

fn build_patch(
    title: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
) -> Result<TaskPatch, String> {
    let mut patch = TaskPatch::default();
    if let Some(title) = title {
        patch = patch.title(title);
    }
    if let Some(priority) = priority {
        patch = patch.priority(priority.parse::<Priority>().map_err(|err| err.to_string())?);
    }
    if let Some(status) = status {
        patch = patch.status(status.parse::<TaskStatus>().map_err(|err| err.to_string())?);
    }
    if let Some(due_date) = due_date {
        patch = patch.due_date(parse_due_date(&due_date).map_err(|err| err.to_string())?);
    }
    if let Some(notes) = notes {
        patch = patch.notes(Some(notes));
    }
    Ok(patch)
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid task id `{}`", raw.trim()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn to_task_row(task: &Task, today: NaiveDate) -> TaskRow {
    TaskRow {
        id: task.id.to_string(),
        title: task.title.clone(),
        priority: task.priority.label().to_string(),
        status: task.status.label().to_string(),
        due_date: task
            .due_date
            .map(|date| date.format("%Y-%m-%d").to_string()),
        notes: task.notes.clone(),
        category: classify(task, today).label().to_string(),
        urgency: urgency_score(task, today),
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
